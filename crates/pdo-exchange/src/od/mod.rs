// crates/pdo-exchange/src/od/mod.rs
//! Register dictionary seam.
//!
//! The exchange engine never resolves registers itself. It asks a
//! [`Dictionary`] whether a register may be mapped cyclically, how wide it is
//! and how to turn its bytes into a [`Value`]. [`RegisterTable`] is a small
//! in-memory implementation for applications and tests that already know
//! their registers.

pub mod entry;
pub mod value;

pub use entry::{AccessType, PdoMapping, RegisterDescriptor};
pub use value::{DataType, Value, ValueError};

use crate::types::{Direction, RegisterId};
use std::collections::BTreeMap;

/// Register metadata and codec consumed by the exchange engine.
pub trait Dictionary: Send + Sync {
    /// Returns `true` if the register's access qualifier permits cyclic mapping.
    fn is_cyclic_capable(&self, register: &RegisterId) -> bool;

    /// Whether a cyclic-capable register may be mapped in `direction`.
    fn allows_direction(&self, register: &RegisterId, direction: Direction) -> bool {
        let _ = direction;
        self.is_cyclic_capable(register)
    }

    /// Width of the register in the process-data image, `None` if unknown.
    fn byte_width(&self, register: &RegisterId) -> Option<usize>;

    /// Decodes the register's slice of a received image.
    fn decode(&self, register: &RegisterId, bytes: &[u8]) -> Result<Value, ValueError>;

    /// Encodes a value for the register's slice of the output image.
    fn encode(&self, register: &RegisterId, value: &Value) -> Result<Vec<u8>, ValueError>;
}

/// In-memory [`Dictionary`] keyed by [`RegisterId`].
#[derive(Debug, Clone, Default)]
pub struct RegisterTable {
    entries: BTreeMap<RegisterId, RegisterDescriptor>,
}

impl RegisterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a register description.
    pub fn insert(&mut self, register: RegisterId, descriptor: RegisterDescriptor) {
        self.entries.insert(register, descriptor);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, register: RegisterId, descriptor: RegisterDescriptor) -> Self {
        self.insert(register, descriptor);
        self
    }

    pub fn get(&self, register: &RegisterId) -> Option<&RegisterDescriptor> {
        self.entries.get(register)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Dictionary for RegisterTable {
    fn is_cyclic_capable(&self, register: &RegisterId) -> bool {
        self.entries
            .get(register)
            .is_some_and(|entry| entry.pdo_mapping.is_cyclic())
    }

    fn allows_direction(&self, register: &RegisterId, direction: Direction) -> bool {
        self.entries
            .get(register)
            .is_some_and(|entry| entry.pdo_mapping.allows(direction))
    }

    fn byte_width(&self, register: &RegisterId) -> Option<usize> {
        self.entries
            .get(register)
            .map(|entry| entry.data_type.byte_width())
    }

    fn decode(&self, register: &RegisterId, bytes: &[u8]) -> Result<Value, ValueError> {
        // Unknown registers are passed through untouched.
        match self.entries.get(register) {
            Some(entry) => Value::deserialize(bytes, entry.data_type),
            None => Ok(Value::OctetString(bytes.to_vec())),
        }
    }

    fn encode(&self, register: &RegisterId, value: &Value) -> Result<Vec<u8>, ValueError> {
        match self.entries.get(register) {
            Some(entry) => value.serialize_as(entry.data_type),
            None => Ok(value.serialize()),
        }
    }
}
