use std::time::Duration;

use vecpress_lib::PressConfig;

/// Load shape of a press run.
/// The target rate is `tokens / interval`.
#[derive(Debug, Clone, clap::Args)]
pub struct PressArgs {
    /// Amount of concurrent workers issuing requests.
    #[arg(long = "workers", value_name = "N", default_value_t = 100)]
    pub workers: usize,

    /// Time between two ticks, tokens are minted each tick.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "100ms",
        value_parser = humantime::parse_duration,
    )]
    pub interval: Duration,

    /// Tokens (requests) minted per tick.
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub tokens: usize,

    /// Ticks per epoch, an epoch lasts `interval * period-per-epoch`.
    #[arg(long, value_name = "N", default_value_t = 300)]
    pub period_per_epoch: usize,

    /// Capacity of the request queue, defaults to the tokens per tick.
    /// Tokens which do not fit are dropped (overpress).
    #[arg(long, value_name = "N")]
    pub queue_capacity: Option<usize>,
}

impl PressArgs {
    pub fn press_config(&self) -> PressConfig {
        PressConfig {
            queue_capacity: self.queue_capacity,
            ..PressConfig::new(
                self.interval,
                self.tokens,
                self.period_per_epoch,
                self.workers,
            )
        }
    }
}
