use std::sync::Arc;

use parking_lot::Mutex;

use crate::stat::EpochSummary;

/// Receives the observable output of a press run.
///
/// Epoch summaries are delivered from background tasks,
/// possibly concurrently and not necessarily in index order.
pub trait Reporter: Send + Sync + 'static {
    fn on_epoch(&self, summary: &EpochSummary);

    /// Called for each tick in which the queue was full.
    fn on_overpress(&self, _epoch: u64, _dropped: usize) {}

    /// Called once after the press run stopped.
    fn finish(&self, totals: &RunTotals);
}

impl<R: Reporter> Reporter for Arc<R> {
    fn on_epoch(&self, summary: &EpochSummary) {
        (**self).on_epoch(summary)
    }

    fn on_overpress(&self, epoch: u64, dropped: usize) {
        (**self).on_overpress(epoch, dropped)
    }

    fn finish(&self, totals: &RunTotals) {
        (**self).finish(totals)
    }
}

impl Reporter for Box<dyn Reporter> {
    fn on_epoch(&self, summary: &EpochSummary) {
        (**self).on_epoch(summary)
    }

    fn on_overpress(&self, epoch: u64, dropped: usize) {
        (**self).on_overpress(epoch, dropped)
    }

    fn finish(&self, totals: &RunTotals) {
        (**self).finish(totals)
    }
}

/// Aggregated counters over all epochs of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub epochs: usize,
    pub overloaded_epochs: usize,
    pub overpressed_ticks: usize,
    pub issued: usize,
    pub dropped: usize,
    pub successes: usize,
    pub failures: usize,
    pub abandoned: usize,
}

impl RunTotals {
    pub fn add_epoch(&mut self, summary: &EpochSummary) {
        self.epochs += 1;
        if summary.overloaded() {
            self.overloaded_epochs += 1;
        }
        self.issued += summary.issued;
        self.dropped += summary.dropped;
        self.successes += summary.successes;
        self.failures += summary.failures;
        self.abandoned += summary.abandoned;
    }
}

/// Forwards to a [`Reporter`] while keeping the run totals.
pub(crate) struct ReportSink {
    reporter: Box<dyn Reporter>,
    totals: Mutex<RunTotals>,
}

impl ReportSink {
    pub(crate) fn new(reporter: impl Reporter) -> Self {
        Self {
            reporter: Box::new(reporter),
            totals: Mutex::new(RunTotals::default()),
        }
    }

    pub(crate) fn epoch(&self, summary: &EpochSummary) {
        self.totals.lock().add_epoch(summary);
        self.reporter.on_epoch(summary);
    }

    pub(crate) fn overpress(&self, epoch: u64, dropped: usize) {
        self.totals.lock().overpressed_ticks += 1;
        self.reporter.on_overpress(epoch, dropped);
    }

    pub(crate) fn finish(&self) -> RunTotals {
        let totals = self.totals.lock().clone();
        self.reporter.finish(&totals);
        totals
    }
}
