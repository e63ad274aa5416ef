// crates/pdo-exchange/src/exchange/state.rs
use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`CyclicEngine`](super::CyclicEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EngineState {
    /// No exchange thread; mapping may be changed.
    #[default]
    Idle = 0,
    /// `start` is bringing the device into operational state.
    Starting = 1,
    /// The exchange thread is cycling.
    Running = 2,
    /// `stop` is waiting for the exchange thread to exit.
    Stopping = 3,
    /// The exchange thread hit a fatal fault and exited on its own.
    /// `stop` brings the engine back to `Idle`.
    Faulted = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Starting,
            2 => EngineState::Running,
            3 => EngineState::Stopping,
            4 => EngineState::Faulted,
            _ => EngineState::Idle,
        }
    }
}

/// Engine state shared between the control surface, the exchange thread and
/// the distribution point.
///
/// Only `start`/`stop` and the exchange thread write it; the distribution
/// point reads it to refuse subscriptions.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
