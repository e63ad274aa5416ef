// crates/pdo-exchange/src/poller.rs
//! Consumer side of the exchange: accumulates samples for a subset of the
//! mapped input registers and turns engine faults into callbacks.

use crate::distribution::Subscription;
use crate::fault::Fault;
use crate::od::Value;
use crate::pdo::{FrameLayout, PdoError};
use crate::types::{Direction, RegisterId};
use core::time::Duration;
use log::debug;

/// Lifecycle of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Receiving samples.
    Attached,
    /// The engine reported a fault. Terminal until disposal.
    Faulted,
    /// No longer attached to the engine.
    Detached,
}

/// One sample restricted to the poller's registers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PolledSample {
    pub timestamp: Duration,
    /// Values in the order the registers were given to `poller_for`.
    pub values: Vec<Value>,
}

/// Samples in columnar form: one timestamp list and one value list per register.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PolledColumns {
    pub timestamps: Vec<Duration>,
    pub values: Vec<Vec<Value>>,
}

type ExceptionCallback = Box<dyn FnOnce(&Fault) + Send + 'static>;

/// Reads the samples of a subscription for a fixed set of input registers.
///
/// A poller never blocks and never delivers a sample twice. Exception
/// callbacks run on the thread calling [`read`](Self::read), at most once per
/// poller.
pub struct Poller {
    registers: Vec<RegisterId>,
    positions: Vec<usize>,
    subscription: Option<Subscription>,
    state: PollerState,
    fault: Option<Fault>,
    callbacks: Vec<ExceptionCallback>,
}

impl Poller {
    /// Resolves `registers` against `layout` and binds them to `subscription`.
    pub(crate) fn new(
        registers: &[RegisterId],
        layout: &FrameLayout,
        subscription: Subscription,
    ) -> Result<Self, PdoError> {
        let positions = registers
            .iter()
            .map(|register| {
                layout
                    .input_position(register)
                    .ok_or_else(|| PdoError::RegisterNotMapped {
                        register: register.clone(),
                        direction: Direction::Input,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Poller attached to subscription {} for {} registers",
            subscription.id(),
            registers.len()
        );
        Ok(Self {
            registers: registers.to_vec(),
            positions,
            subscription: Some(subscription),
            state: PollerState::Attached,
            fault: None,
            callbacks: Vec::new(),
        })
    }

    /// Takes every sample received since the last call, oldest first.
    ///
    /// Samples published before a fault are always returned before the
    /// fault's callbacks fire.
    pub fn read(&mut self) -> Vec<PolledSample> {
        let Some(subscription) = &self.subscription else {
            return Vec::new();
        };
        // The fault slot is read before draining so no sample published
        // ahead of the fault is left behind.
        let fault = subscription.fault().cloned();
        let samples = subscription.drain();
        let closed = subscription.is_closed();

        let polled = samples
            .iter()
            .map(|sample| PolledSample {
                timestamp: sample.timestamp(),
                values: self
                    .positions
                    .iter()
                    .filter_map(|&position| sample.values().get(position).cloned())
                    .collect(),
            })
            .collect();

        match fault {
            Some(fault) if self.fault.is_none() => self.raise(fault),
            _ if closed && self.state == PollerState::Attached => {
                debug!("Poller subscription closed by the engine");
                self.state = PollerState::Detached;
                self.subscription = None;
            }
            _ => {}
        }
        polled
    }

    /// Like [`read`](Self::read), with the values split per register.
    pub fn read_columns(&mut self) -> PolledColumns {
        let mut columns = PolledColumns {
            timestamps: Vec::new(),
            values: vec![Vec::new(); self.registers.len()],
        };
        for sample in self.read() {
            columns.timestamps.push(sample.timestamp);
            for (column, value) in columns.values.iter_mut().zip(sample.values) {
                column.push(value);
            }
        }
        columns
    }

    /// Registers `callback` to run once when the engine faults.
    ///
    /// If the poller already saw a fault, `callback` runs immediately.
    pub fn on_exception<F>(&mut self, callback: F)
    where
        F: FnOnce(&Fault) + Send + 'static,
    {
        match &self.fault {
            Some(fault) => callback(fault),
            None => self.callbacks.push(Box::new(callback)),
        }
    }

    fn raise(&mut self, fault: Fault) {
        self.state = PollerState::Faulted;
        for callback in self.callbacks.drain(..) {
            callback(&fault);
        }
        self.fault = Some(fault);
    }

    /// Samples waiting to be read.
    pub fn available_samples(&self) -> usize {
        self.subscription.as_ref().map_or(0, Subscription::len)
    }

    pub fn registers(&self) -> &[RegisterId] {
        &self.registers
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// The fault seen by the last `read`, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Detaches from the engine and discards buffered samples and pending
    /// callbacks. Other pollers and the loop are unaffected.
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            debug!("Poller on subscription {} disposed", subscription.id());
        }
        self.callbacks.clear();
        self.state = PollerState::Detached;
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for Poller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Poller")
            .field("registers", &self.registers)
            .field("state", &self.state)
            .field("fault", &self.fault)
            .field("available", &self.available_samples())
            .finish()
    }
}
