use std::time::Duration;

use rama::{
    error::{ErrorContext as _, OpaqueError},
    graceful::ShutdownGuard,
    telemetry::tracing,
};

use clap::Args;
use vecpress_lib::{PressConfig, Presser, Reporter, RunTotals, Work};

use crate::config::{PressArgs, TargetConfig};

pub mod client;
pub mod reporter;
pub mod search;

use self::{reporter::*, search::SearchWorker};

#[derive(Debug, Clone, Args)]
/// press a vector search service
pub struct RunCommand {
    /// base address of the vector search service, e.g. http://127.0.0.1:19530
    #[arg(value_name = "ADDRESS", required = true)]
    address: String,

    #[clap(flatten)]
    target: TargetConfig,

    #[clap(flatten)]
    press: PressArgs,

    /// Total duration of the run
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "10m",
        value_parser = humantime::parse_duration,
    )]
    total_time: Duration,

    /// report json instead of a human-friendly format
    #[arg(long, default_value_t = false)]
    json: bool,

    /// send a single request, log its outcome and exit
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

pub async fn exec(guard: ShutdownGuard, args: RunCommand) -> Result<(), OpaqueError> {
    let press_config = args.press.press_config();
    press_config.validate().context("validate press config")?;

    let worker = SearchWorker::try_new(
        self::client::http_client(args.target.timeout),
        &args.address,
        &args.target,
    )
    .context("create search worker")?;

    tracing::info!(
        uri = %worker.uri(),
        kind = ?args.target.kind,
        collection = %args.target.collection,
        dim = args.target.dim,
        top_k = args.target.top_k,
        total_time = ?args.total_time,
        "search worker ready",
    );

    if args.dry_run {
        let elapsed = worker.run().await.context("dry run request")?;
        tracing::info!(?elapsed, "dry run request succeeded");
        return Ok(());
    }

    let reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonlReporter)
    } else {
        Box::new(HumanReporter)
    };

    press(guard, press_config, worker, reporter, args.total_time).await?;
    Ok(())
}

/// Press the target with `work` until `total_time` elapsed or the guard is cancelled.
async fn press<W: Work>(
    guard: ShutdownGuard,
    config: PressConfig,
    work: W,
    reporter: impl Reporter,
    total_time: Duration,
) -> Result<Option<RunTotals>, OpaqueError> {
    let presser = Presser::try_new(config, work, reporter).context("create presser")?;
    presser.start();

    tokio::select! {
        _ = guard.cancelled() => {
            tracing::info!("press interrupted: guard shutdown");
        }
        _ = tokio::time::sleep(total_time) => {
            tracing::info!("press done: total time elapsed");
        }
    }

    let totals = presser.stop().await;
    tracing::debug!(?totals, "presser stopped");
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use parking_lot::Mutex;
    use rama::{Layer as _, Service as _, graceful::Shutdown, layer::MapErrLayer};
    use vecpress_lib::stat::EpochSummary;

    use super::*;
    use crate::{
        cmd::mock::{MockSearchState, web_svc},
        config::ServerConfig,
    };

    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(flatten)]
        run: RunCommand,
    }

    #[derive(Debug, Default)]
    struct Summaries(Mutex<Vec<EpochSummary>>);

    impl Reporter for Summaries {
        fn on_epoch(&self, summary: &EpochSummary) {
            self.0.lock().push(summary.clone());
        }

        fn finish(&self, _totals: &RunTotals) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_mock_target() {
        let state = MockSearchState::try_new(ServerConfig {
            base_latency: 0.001,
            jitter: 0.,
            error_rate: 0.,
        })
        .unwrap();
        let client = MapErrLayer::new(OpaqueError::from_std)
            .into_layer(web_svc(state))
            .boxed();

        let cli = Cli::try_parse_from([
            "vecpress",
            "http://vecpress.internal",
            "-c",
            "books",
            "--dim",
            "8",
            "--interval",
            "10ms",
            "--tokens",
            "4",
            "--period-per-epoch",
            "5",
            "--workers",
            "4",
        ])
        .unwrap()
        .run;
        let worker = SearchWorker::try_new(client, &cli.address, &cli.target).unwrap();

        let reporter = Arc::new(Summaries::default());
        let (trigger, signal) = tokio::sync::oneshot::channel::<()>();
        let shutdown = Shutdown::new(async move {
            let _ = signal.await;
        });
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        {
            let reporter = reporter.clone();
            let config = cli.press.press_config();
            shutdown.spawn_task_fn(async move |guard| {
                let totals = press(guard, config, worker, reporter, Duration::from_millis(105))
                    .await
                    .unwrap();
                let _ = done_tx.send(totals);
            });
        }

        let totals = done_rx.await.unwrap().unwrap();
        let _ = trigger.send(());
        let _ = shutdown.shutdown().await;

        // ticks at 0..=100ms: two full epochs and a partial one
        assert_eq!(3, totals.epochs);
        assert_eq!(0, totals.failures);

        let mut summaries = reporter.0.lock().clone();
        summaries.sort_by_key(|summary| summary.index);
        assert_eq!(20, summaries[0].expected);
        assert_eq!(20, summaries[0].successes);
        assert!(!summaries[0].overloaded());
        assert!(summaries[0].latency.as_ref().unwrap().p50 >= Duration::from_millis(1));
        assert_eq!(2, summaries[2].index);
        assert_eq!(4, summaries[2].successes);
    }
}
