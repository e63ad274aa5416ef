// crates/pdo-exchange/src/exchange/watchdog.rs
use std::time::{Duration, Instant};

/// Master-side process-data watchdog.
///
/// Owned by the exchange thread. Refreshed by every successful exchange;
/// once `timeout` has elapsed since the last refresh the link is considered
/// desynchronized.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogState {
    timeout: Duration,
    last_refresh: Instant,
}

impl WatchdogState {
    /// Arms the watchdog as if an exchange had just succeeded at `now`.
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_refresh: now,
        }
    }

    pub fn refresh(&mut self, now: Instant) {
        self.last_refresh = now;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn last_refresh(&self) -> Instant {
        self.last_refresh
    }

    /// Time since the last successful exchange.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refresh)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) >= self.timeout
    }
}
