use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rama::{
    error::{BoxError, OpaqueError},
    graceful::{self, ShutdownGuard},
    telemetry::tracing,
};

use clap::{Parser, Subcommand};
use tokio::sync::oneshot;
use vecpress_lib::utils::telemetry::{TelemetryConfig, init_tracing};

pub mod cmd;
pub mod config;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Rate bounded load generator for vector search services.
///
/// Epoch reports go to stdout, logs go to stderr (or `--log-file`).
#[derive(Debug, Clone, Parser)]
#[command(name = "vecpress", bin_name = "vecpress")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// log debug events such as epoch rollover and failed requests
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    verbose: bool,

    /// multi-line log format, easier to read while following a press run
    #[arg(long, default_value_t = false, global = true)]
    pretty: bool,

    /// append logs to this file, keeping stderr free for the terminal
    #[arg(long = "log-file", short = 'o', value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// how long in-flight requests and the last epoch report may take
    /// after ctrl-c or the end of the run, waits forever when omitted
    #[arg(
        long,
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        global = true,
    )]
    shutdown_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    Run(self::cmd::run::RunCommand),
    Mock(self::cmd::mock::MockCommand),
}

impl Command {
    async fn exec(self, guard: ShutdownGuard) -> Result<(), OpaqueError> {
        match self {
            Command::Run(args) => self::cmd::run::exec(guard, args).await,
            Command::Mock(args) => self::cmd::mock::exec(guard, args).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    init_tracing(TelemetryConfig {
        verbose: cli.verbose,
        pretty: cli.pretty,
        output: cli.log_file.as_deref(),
    })?;

    if let Err(err) = run(graceful::default_signal(), cli).await {
        eprintln!("vecpress failed: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Run the selected command until it returns, fails or `interrupt` fires,
/// then wait for all of its tasks to wind down.
async fn run<F>(interrupt: F, cli: Cli) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let (failure_tx, failure_rx) = oneshot::channel::<OpaqueError>();
    let shutdown = graceful::Shutdown::new(stop_signal(failure_rx, interrupt));

    let failed = Arc::new(AtomicBool::new(false));

    let command = cli.command;
    shutdown.spawn_task_fn({
        let failed = failed.clone();
        async move |guard| {
            if let Err(err) = command.exec(guard).await {
                failed.store(true, Ordering::Release);
                let _ = failure_tx.send(err);
            }
        }
    });

    let elapsed = match cli.shutdown_timeout {
        Some(limit) => shutdown.shutdown_with_limit(limit).await?,
        None => shutdown.shutdown().await,
    };
    tracing::debug!(?elapsed, "vecpress shut down");

    if failed.load(Ordering::Acquire) {
        return Err(OpaqueError::from_display("command failed, see logs").into());
    }
    Ok(())
}

/// Resolves on interrupt, on a command failure,
/// or once the command finished and dropped its failure sender.
fn stop_signal(
    failure_rx: oneshot::Receiver<OpaqueError>,
    interrupt: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        tokio::select! {
            _ = interrupt => {
                tracing::info!("interrupted: stop press and report the last epoch");
            }
            result = failure_rx => match result {
                Ok(err) => tracing::error!("command failed: {err}"),
                Err(_) => tracing::debug!("command finished"),
            },
        }
    }
}
