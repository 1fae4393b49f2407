use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;
use rama::telemetry::tracing;
use tokio::sync::Notify;

use super::summary::{EpochSummary, LatencyStats};

/// Upper bound of latency slots reserved when an epoch opens,
/// larger epochs grow their sample on demand.
const LATENCY_PREALLOC_LIMIT: usize = 64 * 1024;

/// Shared state of one epoch,
/// reachable by the scheduler (through [`OpenEpoch`] and [`SealedEpoch`])
/// and by workers (through [`Permit`]).
#[derive(Debug)]
struct EpochState {
    index: u64,
    started_at: SystemTime,
    expected: usize,

    records: Mutex<Records>,
    failures: AtomicUsize,
    abandoned: AtomicUsize,

    in_flight: AtomicUsize,
    idle: Notify,
}

#[derive(Debug, Default)]
struct Records {
    latencies: Vec<Duration>,
    total: Duration,
    successes: usize,
}

impl EpochState {
    fn record(&self, elapsed: Duration) {
        let mut records = self.records.lock();
        records.latencies.push(elapsed);
        records.total = records.total.saturating_add(elapsed);
        records.successes += 1;
    }

    fn record_error(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_issued(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    fn mark_completed(&self) {
        let previous = self.in_flight.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "epoch in-flight counter underflow");
        if previous == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            // register interest before checking the counter,
            // so a release in between is never missed
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// An epoch which still accepts new permits.
///
/// Only the scheduler owns it. Sealing consumes it,
/// so no permit can be issued for a sealed epoch.
#[derive(Debug)]
pub struct OpenEpoch {
    state: Arc<EpochState>,
    issued: usize,
    dropped: usize,
    ticks: usize,
}

impl OpenEpoch {
    pub fn new(index: u64, started_at: SystemTime, expected: usize) -> Self {
        Self {
            state: Arc::new(EpochState {
                index,
                started_at,
                expected,
                records: Mutex::new(Records {
                    latencies: Vec::with_capacity(expected.min(LATENCY_PREALLOC_LIMIT)),
                    ..Default::default()
                }),
                failures: AtomicUsize::new(0),
                abandoned: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
            issued: 0,
            dropped: 0,
            ticks: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.state.index
    }

    /// Amount of ticks this epoch has been open for.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Issue a permit owned by this epoch.
    ///
    /// Only call this once the permit is certain to be handed
    /// to the queue, the in-flight counter is raised immediately.
    pub fn issue(&mut self) -> Permit {
        self.state.mark_issued();
        self.issued += 1;
        Permit {
            epoch: self.state.clone(),
            finished: false,
        }
    }

    /// Account tokens that could not be enqueued.
    pub fn drop_tokens(&mut self, n: usize) {
        self.dropped += n;
    }

    /// Count a tick, returns the amount of ticks counted so far.
    pub fn tick(&mut self) -> usize {
        self.ticks += 1;
        self.ticks
    }

    pub fn seal(self) -> SealedEpoch {
        tracing::debug!(
            epoch = self.state.index,
            issued = self.issued,
            dropped = self.dropped,
            ticks = self.ticks,
            "epoch sealed",
        );
        SealedEpoch {
            state: self.state,
            issued: self.issued,
            dropped: self.dropped,
        }
    }
}

/// An epoch which no longer accepts permits,
/// but might still have permits in flight.
#[derive(Debug)]
pub struct SealedEpoch {
    state: Arc<EpochState>,
    issued: usize,
    dropped: usize,
}

impl SealedEpoch {
    pub fn index(&self) -> u64 {
        self.state.index
    }

    /// Wait for all permits issued for this epoch to be finished,
    /// and summarize what they recorded.
    pub async fn summarize(self) -> EpochSummary {
        self.state.wait_idle().await;

        let (latencies, total, successes) = {
            let mut records = self.state.records.lock();
            let records = std::mem::take(&mut *records);
            (records.latencies, records.total, records.successes)
        };

        let failures = self.state.failures.load(Ordering::Acquire);
        let abandoned = self.state.abandoned.load(Ordering::Acquire);

        debug_assert!(successes + failures + abandoned == self.issued);
        debug_assert!(successes + failures <= self.state.expected);

        EpochSummary {
            index: self.state.index,
            started_at: self.state.started_at,
            expected: self.state.expected,
            issued: self.issued,
            dropped: self.dropped,
            successes,
            failures,
            abandoned,
            latency: LatencyStats::compute(latencies, total),
        }
    }
}

/// Authorization to perform one unit of work for an epoch.
///
/// Finishing a permit (recording its outcome or dropping it)
/// releases its in-flight slot exactly once.
/// A permit dropped without an outcome counts as abandoned.
#[derive(Debug)]
pub struct Permit {
    epoch: Arc<EpochState>,
    finished: bool,
}

impl Permit {
    pub fn epoch_index(&self) -> u64 {
        self.epoch.index
    }

    pub fn record(mut self, elapsed: Duration) {
        self.epoch.record(elapsed);
        self.finished = true;
    }

    pub fn record_error(mut self) {
        self.epoch.record_error();
        self.finished = true;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.finished {
            self.epoch.abandoned.fetch_add(1, Ordering::Relaxed);
        }
        self.epoch.mark_completed();
    }
}
