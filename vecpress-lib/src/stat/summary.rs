use std::{
    fmt,
    time::{Duration, SystemTime},
};

/// Report of a single epoch, computed once all its permits finished.
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub index: u64,
    /// Wall clock time of the first tick of the epoch.
    pub started_at: SystemTime,
    /// Permits the epoch would have received without back-pressure.
    pub expected: usize,
    /// Permits which made it into the queue.
    pub issued: usize,
    /// Tokens dropped because the queue was full.
    pub dropped: usize,
    pub successes: usize,
    pub failures: usize,
    /// Permits still queued when the workers shut down.
    pub abandoned: usize,
    /// `None` when no request succeeded in this epoch.
    pub latency: Option<LatencyStats>,
}

impl EpochSummary {
    /// Fewer requests completed than the configured load would produce.
    pub fn overloaded(&self) -> bool {
        self.successes + self.failures < self.expected
    }
}

impl fmt::Display for EpochSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {}: expected={} success={} failure={} overloaded={} start={}",
            self.index,
            self.expected,
            self.successes,
            self.failures,
            self.overloaded(),
            humantime::format_rfc3339_seconds(self.started_at),
        )?;
        if self.dropped > 0 || self.abandoned > 0 {
            write!(f, " dropped={} abandoned={}", self.dropped, self.abandoned)?;
        }
        match &self.latency {
            Some(latency) => write!(f, " {latency}"),
            None => write!(f, " no data this epoch"),
        }
    }
}

/// Latency distribution of the successful requests in an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub mean: Duration,
    pub min: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl LatencyStats {
    /// Compute the distribution of the given latencies,
    /// `total` being their sum. Returns `None` for an empty sample.
    pub fn compute(mut latencies: Vec<Duration>, total: Duration) -> Option<Self> {
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_unstable();

        let n = latencies.len();
        let mean = Duration::from_nanos((total.as_nanos() / n as u128) as u64);

        Some(Self {
            mean,
            min: latencies[0],
            p50: latencies[percentile_index(n, 50)],
            p90: latencies[percentile_index(n, 90)],
            p99: latencies[percentile_index(n, 99)],
            max: latencies[n - 1],
        })
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={:?} p50={:?} p90={:?} p99={:?} max={:?}",
            self.mean, self.p50, self.p90, self.p99, self.max,
        )
    }
}

/// Nearest rank index of the `pct`-th percentile within
/// an ascending sample of `n > 0` values.
pub fn percentile_index(n: usize, pct: usize) -> usize {
    let rank = (n * pct).div_ceil(100);
    rank.saturating_sub(1).min(n - 1)
}
