use std::{fmt, time::Duration};

/// Load shape of a single press run.
///
/// The target throughput is `tokens_per_tick / interval`,
/// an epoch spans `interval * ticks_per_epoch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressConfig {
    /// Cadence at which permits are minted.
    pub interval: Duration,
    /// Maximum amount of permits minted per tick.
    pub tokens_per_tick: usize,
    /// Amount of ticks after which the open epoch is sealed.
    pub ticks_per_epoch: usize,
    /// Amount of concurrent workers consuming permits.
    pub workers: usize,
    /// Capacity of the permit queue, defaults to `tokens_per_tick`.
    pub queue_capacity: Option<usize>,
}

impl PressConfig {
    pub fn new(
        interval: Duration,
        tokens_per_tick: usize,
        ticks_per_epoch: usize,
        workers: usize,
    ) -> Self {
        Self {
            interval,
            tokens_per_tick,
            ticks_per_epoch,
            workers,
            queue_capacity: None,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Capacity of the bounded permit queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.tokens_per_tick)
    }

    /// Amount of permits an epoch receives when no token is ever dropped.
    pub fn expected_epoch_size(&self) -> usize {
        self.tokens_per_tick.saturating_mul(self.ticks_per_epoch)
    }

    /// Duration of a full epoch.
    pub fn epoch_duration(&self) -> Duration {
        self.interval
            .saturating_mul(u32::try_from(self.ticks_per_epoch).unwrap_or(u32::MAX))
    }

    pub fn validate(&self) -> Result<(), PressConfigError> {
        if self.interval.is_zero() {
            return Err(PressConfigError::ZeroInterval);
        }
        if self.tokens_per_tick == 0 {
            return Err(PressConfigError::ZeroTokensPerTick);
        }
        if self.ticks_per_epoch == 0 {
            return Err(PressConfigError::ZeroTicksPerEpoch);
        }
        if self.workers == 0 {
            return Err(PressConfigError::ZeroWorkers);
        }
        if self.queue_capacity() == 0 {
            return Err(PressConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum PressConfigError {
    ZeroInterval,
    ZeroTokensPerTick,
    ZeroTicksPerEpoch,
    ZeroWorkers,
    ZeroQueueCapacity,
}

impl fmt::Display for PressConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PressConfigError::ZeroInterval => {
                write!(f, "PressConfigError: tick interval must be non-zero")
            }
            PressConfigError::ZeroTokensPerTick => {
                write!(f, "PressConfigError: tokens per tick must be at least 1")
            }
            PressConfigError::ZeroTicksPerEpoch => {
                write!(f, "PressConfigError: ticks per epoch must be at least 1")
            }
            PressConfigError::ZeroWorkers => {
                write!(f, "PressConfigError: worker count must be at least 1")
            }
            PressConfigError::ZeroQueueCapacity => {
                write!(f, "PressConfigError: queue capacity must be at least 1")
            }
        }
    }
}

impl std::error::Error for PressConfigError {}
