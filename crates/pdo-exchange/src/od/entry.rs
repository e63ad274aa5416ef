use super::value::DataType;
use crate::types::Direction;

/// Defines the access rights of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    /// read only access
    ReadOnly,
    /// write only access
    WriteOnly,
    /// read and write access
    ReadWrite,
}

/// Defines the PDO mapping possibility of a register.
///
/// Only `Rx` and `Tx` registers may take part in the cyclic exchange; the
/// qualifier also tells in which direction they can be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoMapping {
    /// Configuration-only register, request/response access.
    No,
    /// Mappable into the output image (RPDO, master to device).
    Rx,
    /// Mappable into the input image (TPDO, device to master).
    Tx,
    /// Mappable in both directions.
    RxTx,
}

impl PdoMapping {
    /// Whether the register may be part of the cyclic frame at all.
    pub fn is_cyclic(&self) -> bool {
        !matches!(self, PdoMapping::No)
    }

    /// Whether the register may be mapped in `direction`.
    pub fn allows(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (PdoMapping::Tx | PdoMapping::RxTx, Direction::Input)
                | (PdoMapping::Rx | PdoMapping::RxTx, Direction::Output)
        )
    }
}

/// Metadata of one register in a [`RegisterTable`](super::RegisterTable).
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDescriptor {
    /// A descriptive name, for diagnostics only.
    pub name: String,
    pub data_type: DataType,
    pub access: AccessType,
    pub pdo_mapping: PdoMapping,
}

impl RegisterDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType, pdo_mapping: PdoMapping) -> Self {
        let access = match pdo_mapping {
            PdoMapping::Tx => AccessType::ReadOnly,
            PdoMapping::Rx => AccessType::WriteOnly,
            PdoMapping::No | PdoMapping::RxTx => AccessType::ReadWrite,
        };
        Self {
            name: name.into(),
            data_type,
            access,
            pdo_mapping,
        }
    }

    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }
}
