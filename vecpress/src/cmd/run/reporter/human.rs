use vecpress_lib::{Reporter, RunTotals, stat::EpochSummary};

/// Prints one line per epoch, formatted for humans.
#[derive(Debug, Default)]
pub struct HumanReporter;

impl HumanReporter {
    pub(super) fn final_line(totals: &RunTotals) -> String {
        format!(
            "done epochs={} overloaded={} success={} failure={} issued={} dropped={} abandoned={} overpressed_ticks={}",
            totals.epochs,
            totals.overloaded_epochs,
            totals.successes,
            totals.failures,
            totals.issued,
            totals.dropped,
            totals.abandoned,
            totals.overpressed_ticks,
        )
    }
}

impl Reporter for HumanReporter {
    fn on_epoch(&self, summary: &EpochSummary) {
        println!("{summary}");
    }

    fn finish(&self, totals: &RunTotals) {
        println!("{}", Self::final_line(totals));
    }
}
