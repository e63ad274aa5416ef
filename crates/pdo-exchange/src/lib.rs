//! Cyclic process-data (PDO) exchange with a fieldbus device.
//!
//! A [`CyclicEngine`] owns a [`ProcessDataTransport`] and a [`Dictionary`].
//! Registers are mapped into an input and an output image, then a dedicated
//! thread exchanges both images at a fixed period, supervised by a watchdog.
//! Every successful cycle produces a [`Sample`] that is handed to each
//! [`Poller`] through a bounded, drop-oldest queue, so a slow consumer never
//! delays the exchange. A fatal failure is reported once to every poller as
//! a [`Fault`] and stops the exchange.

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod config;
mod log;

// --- Register Access ---
pub mod od;
pub mod pdo;

// --- Exchange ---
pub mod exchange;
pub mod distribution;
pub mod fault;
pub mod poller;

// --- Top-level Exports ---
pub use types::{DeviceState, Direction, NodeId, RegisterAddress, RegisterId};
pub use hal::{ProcessDataTransport, TransportError};
pub use config::EngineConfig;
pub use od::{DataType, Dictionary, PdoMapping, RegisterDescriptor, RegisterTable, Value, ValueError};
pub use pdo::{FrameLayout, FrameLimits, LayoutEntry, MappingTable, PdoError};
pub use exchange::{CyclicEngine, EngineState, EngineStats};
pub use distribution::{Sample, Subscription};
pub use fault::{Fault, FaultKind};
pub use poller::{PolledColumns, PolledSample, Poller, PollerState};
