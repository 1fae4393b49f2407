use std::sync::Arc;

use parking_lot::Mutex;
use rama::{graceful::Shutdown, telemetry::tracing};
use tokio::sync::{mpsc, oneshot};

use crate::{
    config::{PressConfig, PressConfigError},
    report::{ReportSink, Reporter, RunTotals},
};

mod scheduler;
mod work;
mod worker;

pub use self::work::Work;

use self::scheduler::Scheduler;

/// Drives [`Work`] at a bounded rate and reports epoch statistics.
///
/// The presser owns a scheduler, minting permits on a fixed tick,
/// and a fixed size pool of workers executing the work for each permit.
pub struct Presser<W> {
    config: PressConfig,
    work: Arc<W>,
    sink: Arc<ReportSink>,
    lifecycle: Mutex<Lifecycle>,
}

enum Lifecycle {
    Idle,
    Running {
        trigger: oneshot::Sender<()>,
        shutdown: Shutdown,
    },
    Stopped,
}

impl<W: Work> Presser<W> {
    pub fn try_new(
        config: PressConfig,
        work: W,
        reporter: impl Reporter,
    ) -> Result<Self, PressConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            work: Arc::new(work),
            sink: Arc::new(ReportSink::new(reporter)),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    pub fn config(&self) -> &PressConfig {
        &self.config
    }

    /// Spawn the workers and the scheduler on the current tokio runtime.
    ///
    /// Only the first call starts the presser, it cannot be restarted.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::Idle) {
            tracing::warn!("presser already started: ignore start");
            return;
        }

        let (trigger, signal) = oneshot::channel::<()>();
        let shutdown = Shutdown::new(async move {
            let _ = signal.await;
        });

        let (permit_tx, permit_rx) = mpsc::channel(self.config.queue_capacity());
        let queue: worker::PermitQueue = Arc::new(tokio::sync::Mutex::new(permit_rx));

        // the receiver is only owned by workers,
        // it is dropped (releasing queued permits) once the last one exits
        for id in 0..self.config.workers {
            let work = self.work.clone();
            let queue = queue.clone();
            shutdown.spawn_task_fn(move |guard| worker::run(id, guard, work, queue));
        }
        drop(queue);

        let scheduler = Scheduler::new(&self.config, permit_tx, self.sink.clone());
        shutdown.spawn_task_fn(move |guard| scheduler.run(guard));

        tracing::info!(
            interval = ?self.config.interval,
            tokens_per_tick = self.config.tokens_per_tick,
            ticks_per_epoch = self.config.ticks_per_epoch,
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity(),
            "presser started",
        );

        *lifecycle = Lifecycle::Running { trigger, shutdown };
    }

    /// Stop the presser and wait until all its tasks exited,
    /// the last epoch included.
    ///
    /// Returns the run totals for the call that stopped a running presser,
    /// `None` if it was never started or already stopped.
    pub async fn stop(&self) -> Option<RunTotals> {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);
        let Lifecycle::Running { trigger, shutdown } = previous else {
            tracing::debug!("presser not running: ignore stop");
            return None;
        };

        let _ = trigger.send(());
        let delay = shutdown.shutdown().await;
        tracing::debug!("presser stopped with a delay of: {delay:?}");

        Some(self.sink.finish())
    }
}
