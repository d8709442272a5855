use std::time::Duration;

/// Scheduler period between ticks
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(10);
/// Bound on a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Re-probes performed after an initial failure
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Wait before each re-probe
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Timing constants driving the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub tick_period: Duration,
    pub probe_timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl EngineConfig {
    /// Worst-case time between an initial failure and a confirmed outage,
    /// ignoring probe latency.
    pub fn confirmation_delay(&self) -> Duration {
        self.retry_delay * self.retry_attempts
    }
}
