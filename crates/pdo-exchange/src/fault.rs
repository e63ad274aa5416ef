// crates/pdo-exchange/src/fault.rs
use crate::distribution::Distributor;
use crate::log::{EngineLogContext, ctx_error};
use core::fmt;
use core::time::Duration;
use std::sync::{Arc, OnceLock};

/// Why a running exchange stopped on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaultKind {
    /// No successful exchange for longer than the watchdog timeout.
    WatchdogExpired,
    /// The device refused a requested state transition during the run.
    DeviceTransitionFailed,
    /// The device left the operational state without being asked to.
    UnexpectedStateChange,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WatchdogExpired => write!(f, "watchdog expired"),
            Self::DeviceTransitionFailed => write!(f, "device transition failed"),
            Self::UnexpectedStateChange => write!(f, "unexpected device state change"),
        }
    }
}

/// A terminal failure of the exchange thread, delivered to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fault {
    pub kind: FaultKind,
    pub detail: String,
    /// Time since the exchange was started.
    pub at: Duration,
    /// Loop iteration during which the fault was detected.
    pub cycle: u64,
}

impl Fault {
    pub fn new(kind: FaultKind, detail: impl Into<String>, at: Duration, cycle: u64) -> Self {
        Self {
            kind,
            detail: detail.into(),
            at,
            cycle,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at cycle {} ({:?} after start): {}",
            self.kind, self.cycle, self.at, self.detail
        )
    }
}

impl std::error::Error for Fault {}

/// Forwards the first fault of a run to the distribution point.
///
/// One relay exists per run. Later reports are ignored.
pub(crate) struct FaultRelay {
    fault: OnceLock<Fault>,
    distributor: Arc<Distributor>,
    log: EngineLogContext,
}

impl FaultRelay {
    pub(crate) fn new(distributor: Arc<Distributor>, log: EngineLogContext) -> Self {
        Self {
            fault: OnceLock::new(),
            distributor,
            log,
        }
    }

    /// Records `fault` and hands it to every subscriber.
    ///
    /// Returns `false` if a fault was already reported for this run.
    pub(crate) fn report(&self, fault: Fault) -> bool {
        if self.fault.set(fault).is_err() {
            return false;
        }
        if let Some(fault) = self.fault.get() {
            ctx_error!(self.log, "Exchange faulted: {}", fault);
            self.distributor.publish_fault(fault);
        }
        true
    }

    pub(crate) fn fault(&self) -> Option<&Fault> {
        self.fault.get()
    }
}
