use std::sync::Arc;

use rama::{graceful::ShutdownGuard, telemetry::tracing};
use tokio::sync::{Mutex, mpsc::Receiver};

use super::Work;
use crate::stat::Permit;

/// Permit queue shared by all workers of a pool.
pub(super) type PermitQueue = Arc<Mutex<Receiver<Permit>>>;

pub(super) async fn run<W: Work>(id: usize, guard: ShutdownGuard, work: Arc<W>, queue: PermitQueue) {
    loop {
        let permit = tokio::select! {
            biased;

            _ = guard.cancelled() => {
                tracing::trace!(worker = id, "exit worker: guard shutdown");
                return;
            }

            maybe_permit = next_permit(&queue) => {
                let Some(permit) = maybe_permit else {
                    tracing::debug!(worker = id, "exit worker: permit queue closed");
                    return;
                };

                permit
            }
        };

        // a dequeued permit always runs to completion, even during shutdown
        execute(id, work.as_ref(), permit).await;
    }
}

async fn next_permit(queue: &Mutex<Receiver<Permit>>) -> Option<Permit> {
    queue.lock().await.recv().await
}

async fn execute<W: Work>(id: usize, work: &W, permit: Permit) {
    match work.run().await {
        Ok(elapsed) => permit.record(elapsed),
        Err(err) => {
            tracing::debug!(
                worker = id,
                epoch = permit.epoch_index(),
                "work failed: {err}",
            );
            permit.record_error();
        }
    }
}
