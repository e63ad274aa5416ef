//! Engine configuration and timing defaults.

use core::time::Duration;

/// Refresh period used when the caller has no preference.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_millis(10);
/// Shortest period the exchange thread is allowed to run at.
pub const MINIMUM_REFRESH_PERIOD: Duration = Duration::from_millis(1);
/// Lower bound of a derived watchdog timeout.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(100);
/// A derived watchdog timeout is at least this many periods.
pub const WATCHDOG_INCREMENT_FACTOR: u32 = 2;
/// Samples buffered per subscription before the oldest is dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Remaining wait below which the thread spins instead of sleeping.
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_millis(1);

/// Static configuration of a [`CyclicEngine`](crate::CyclicEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name used in log records and as the exchange thread name.
    pub name: String,
    /// Capacity of each subscription queue.
    pub queue_capacity: usize,
    /// Periods below this are rejected by `start`.
    pub minimum_period: Duration,
    /// Floor of the derived watchdog timeout.
    pub default_watchdog: Duration,
    /// Multiplier applied to the period when deriving a watchdog timeout.
    pub watchdog_factor: u32,
    /// The last part of every wait is spent spinning for better period accuracy.
    pub spin_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "pdo".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            minimum_period: MINIMUM_REFRESH_PERIOD,
            default_watchdog: DEFAULT_WATCHDOG_TIMEOUT,
            watchdog_factor: WATCHDOG_INCREMENT_FACTOR,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A capacity of zero is raised to one.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_minimum_period(mut self, period: Duration) -> Self {
        self.minimum_period = period;
        self
    }

    pub fn with_default_watchdog(mut self, timeout: Duration, factor: u32) -> Self {
        self.default_watchdog = timeout;
        self.watchdog_factor = factor.max(1);
        self
    }

    pub fn with_spin_threshold(mut self, threshold: Duration) -> Self {
        self.spin_threshold = threshold;
        self
    }

    /// Watchdog timeout used when the caller does not give one:
    /// `max(default_watchdog, watchdog_factor * period)`.
    pub fn derived_watchdog(&self, period: Duration) -> Duration {
        self.default_watchdog
            .max(period.saturating_mul(self.watchdog_factor))
    }
}
