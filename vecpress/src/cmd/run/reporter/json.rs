use std::time::Duration;

use serde_json::{Value, json};
use vecpress_lib::{Reporter, RunTotals, stat::EpochSummary};

/// Prints one json object per line.
#[derive(Debug, Default)]
pub struct JsonlReporter;

fn millis(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.
}

impl JsonlReporter {
    pub(super) fn epoch_line(summary: &EpochSummary) -> Value {
        let latency = summary.latency.as_ref().map(|latency| {
            json!({
                "mean_ms": millis(latency.mean),
                "min_ms": millis(latency.min),
                "p50_ms": millis(latency.p50),
                "p90_ms": millis(latency.p90),
                "p99_ms": millis(latency.p99),
                "max_ms": millis(latency.max),
            })
        });

        json!({
            "type": "epoch",
            "index": summary.index,
            "start": humantime::format_rfc3339_seconds(summary.started_at).to_string(),
            "expected": summary.expected,
            "issued": summary.issued,
            "dropped": summary.dropped,
            "success": summary.successes,
            "failure": summary.failures,
            "abandoned": summary.abandoned,
            "overloaded": summary.overloaded(),
            "latency": latency,
        })
    }

    pub(super) fn overpress_line(epoch: u64, dropped: usize) -> Value {
        json!({
            "type": "overpress",
            "epoch": epoch,
            "dropped": dropped,
        })
    }

    pub(super) fn final_line(totals: &RunTotals) -> Value {
        json!({
            "type": "final",
            "total": {
                "epochs": totals.epochs,
                "overloaded": totals.overloaded_epochs,
                "overpressed_ticks": totals.overpressed_ticks,
                "issued": totals.issued,
                "dropped": totals.dropped,
                "success": totals.successes,
                "failure": totals.failures,
                "abandoned": totals.abandoned,
            }
        })
    }
}

impl Reporter for JsonlReporter {
    fn on_epoch(&self, summary: &EpochSummary) {
        println!("{}", Self::epoch_line(summary));
    }

    fn on_overpress(&self, epoch: u64, dropped: usize) {
        println!("{}", Self::overpress_line(epoch, dropped));
    }

    fn finish(&self, totals: &RunTotals) {
        println!("{}", Self::final_line(totals));
    }
}
