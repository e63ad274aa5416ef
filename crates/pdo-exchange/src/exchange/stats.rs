// crates/pdo-exchange/src/exchange/stats.rs
use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

/// Counters updated by the exchange thread and the distribution point.
#[derive(Debug, Default)]
pub(crate) struct LoopStats {
    cycles: AtomicU64,
    exchanges_ok: AtomicU64,
    exchanges_failed: AtomicU64,
    overruns: AtomicU64,
    samples_published: AtomicU64,
    samples_dropped: AtomicU64,
    last_cycle_ns: AtomicU64,
    max_cycle_ns: AtomicU64,
}

impl LoopStats {
    pub(crate) fn reset(&self) {
        for counter in [
            &self.cycles,
            &self.exchanges_ok,
            &self.exchanges_failed,
            &self.overruns,
            &self.samples_published,
            &self.samples_dropped,
            &self.last_cycle_ns,
            &self.max_cycle_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn cycle_started(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exchange_ok(&self) {
        self.exchanges_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exchange_failed(&self) {
        self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn overrun(&self) -> u64 {
        self.overruns.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn sample_published(&self) {
        self.samples_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cycle_duration(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.last_cycle_ns.store(ns, Ordering::Relaxed);
        self.max_cycle_ns.fetch_max(ns, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            exchanges_ok: self.exchanges_ok.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            samples_published: self.samples_published.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            last_cycle: Duration::from_nanos(self.last_cycle_ns.load(Ordering::Relaxed)),
            max_cycle: Duration::from_nanos(self.max_cycle_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of the exchange counters of the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EngineStats {
    /// Loop iterations started.
    pub cycles: u64,
    /// Successful transport exchanges.
    pub exchanges_ok: u64,
    /// Failed exchanges absorbed by the watchdog window (or the fatal one).
    pub exchanges_failed: u64,
    /// Cycles whose work took longer than the period.
    pub overruns: u64,
    pub samples_published: u64,
    /// Samples evicted from full subscription queues, summed over subscribers.
    pub samples_dropped: u64,
    /// Work time of the most recent cycle, excluding the wait.
    pub last_cycle: Duration,
    pub max_cycle: Duration,
}
