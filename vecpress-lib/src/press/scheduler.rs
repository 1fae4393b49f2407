use std::{sync::Arc, time::SystemTime};

use rama::{graceful::ShutdownGuard, telemetry::tracing};
use tokio::{
    sync::mpsc::{Sender, error::TrySendError},
    time::{Duration, MissedTickBehavior},
};

use crate::{
    config::PressConfig,
    report::ReportSink,
    stat::{OpenEpoch, Permit, SealedEpoch},
};

/// Tick driven permit scheduler.
///
/// Every tick a fixed amount of tokens is offered to the bounded permit queue.
/// Tokens which do not fit are dropped for good: the scheduler never blocks
/// on the queue and never carries tokens over to the next tick.
///
/// After `ticks_per_epoch` ticks the open epoch is sealed and summarized
/// in the background, the next tick opens a new epoch.
pub(super) struct Scheduler {
    interval: Duration,
    tokens_per_tick: usize,
    ticks_per_epoch: usize,
    expected_epoch_size: usize,

    queue: Sender<Permit>,
    sink: Arc<ReportSink>,

    current: Option<OpenEpoch>,
    next_index: u64,
}

impl Scheduler {
    pub(super) fn new(
        config: &PressConfig,
        queue: Sender<Permit>,
        sink: Arc<ReportSink>,
    ) -> Self {
        Self {
            interval: config.interval,
            tokens_per_tick: config.tokens_per_tick,
            ticks_per_epoch: config.ticks_per_epoch,
            expected_epoch_size: config.expected_epoch_size(),
            queue,
            sink,
            current: None,
            next_index: 0,
        }
    }

    pub(super) async fn run(mut self, guard: ShutdownGuard) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = guard.cancelled() => {
                    tracing::debug!("exit scheduler: guard shutdown");
                    break;
                }

                _ = ticker.tick() => {
                    if let Some(sealed) = self.tick(SystemTime::now()) {
                        let sink = self.sink.clone();
                        guard.spawn_task_fn(move |guard| report_epoch(guard, sealed, sink));
                    }
                }
            }
        }

        // the last epoch is reported even when it did not run for all its ticks
        if let Some(epoch) = self.current.take() {
            let summary = epoch.seal().summarize().await;
            self.sink.epoch(&summary);
        }
    }

    /// Handle a single tick, returns the epoch sealed by it, if any.
    fn tick(&mut self, now: SystemTime) -> Option<SealedEpoch> {
        let mut epoch = match self.current.take() {
            Some(epoch) => epoch,
            None => self.open_epoch(now),
        };

        self.offer_tokens(&mut epoch);

        if epoch.tick() >= self.ticks_per_epoch {
            Some(epoch.seal())
        } else {
            self.current = Some(epoch);
            None
        }
    }

    fn open_epoch(&mut self, now: SystemTime) -> OpenEpoch {
        let index = self.next_index;
        self.next_index += 1;
        tracing::debug!(
            epoch = index,
            expected = self.expected_epoch_size,
            "epoch opened",
        );
        OpenEpoch::new(index, now, self.expected_epoch_size)
    }

    fn offer_tokens(&self, epoch: &mut OpenEpoch) {
        for offered in 0..self.tokens_per_tick {
            let slot = match self.queue.try_reserve() {
                Ok(slot) => slot,
                Err(err) => {
                    let dropped = self.tokens_per_tick - offered;
                    epoch.drop_tokens(dropped);
                    match err {
                        TrySendError::Full(()) => {
                            tracing::warn!(epoch = epoch.index(), dropped, "overpress detected");
                            self.sink.overpress(epoch.index(), dropped);
                        }
                        TrySendError::Closed(()) => {
                            tracing::debug!(
                                epoch = epoch.index(),
                                dropped,
                                "permit queue closed: drop tokens",
                            );
                        }
                    }
                    return;
                }
            };
            // sending on a reserved slot cannot fail
            slot.send(epoch.issue());
        }
    }
}

async fn report_epoch(_guard: ShutdownGuard, epoch: SealedEpoch, sink: Arc<ReportSink>) {
    let index = epoch.index();
    let summary = epoch.summarize().await;
    tracing::debug!(epoch = index, "epoch summarized");
    sink.epoch(&summary);
}
