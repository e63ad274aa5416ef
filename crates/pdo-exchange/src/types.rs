use core::convert::TryFrom;
use core::fmt;

/// Identifies a device (slave) on the process-data network.
///
/// The engine never interprets the value; it only travels with a register
/// so that two devices exposing the same object index stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeId(pub u16);

impl From<u16> for NodeId {
    fn from(value: u16) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u16 {
    fn from(node_id: NodeId) -> Self {
        node_id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// How a register is addressed inside a device dictionary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RegisterAddress {
    /// Numeric object address (CANopen-style index / sub-index).
    Object { index: u16, sub_index: u8 },
    /// Symbolic register name (e.g. `CL_POS_FBK_VALUE`), resolved by the dictionary.
    Named(String),
}

/// Fully qualified register identity: which device, which register.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RegisterId {
    pub node: NodeId,
    pub address: RegisterAddress,
}

impl RegisterId {
    /// Register addressed by object index and sub-index.
    pub fn object(node: impl Into<NodeId>, index: u16, sub_index: u8) -> Self {
        Self {
            node: node.into(),
            address: RegisterAddress::Object { index, sub_index },
        }
    }

    /// Register addressed by its symbolic name.
    pub fn named(node: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            address: RegisterAddress::Named(name.into()),
        }
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            RegisterAddress::Object { index, sub_index } => {
                write!(f, "{}:{:#06X}/{:#04X}", self.node.0, index, sub_index)
            }
            RegisterAddress::Named(name) => write!(f, "{}:{}", self.node.0, name),
        }
    }
}

/// Direction of a mapped register, seen from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Direction {
    /// Device to master (TPDO on the device side).
    Input,
    /// Master to device (RPDO on the device side).
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Communication state reported by the device, following the usual
/// fieldbus slave state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DeviceState {
    #[default]
    Init = 0x01,
    PreOperational = 0x02,
    Bootstrap = 0x03,
    SafeOperational = 0x04,
    Operational = 0x08,
}

/// Error type for unknown device state codes.
#[derive(Debug, PartialEq, Eq)]
pub enum DeviceStateError {
    InvalidValue(u8),
}

impl fmt::Display for DeviceStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStateError::InvalidValue(value) => {
                write!(f, "Invalid device state value: {:#04x}", value)
            }
        }
    }
}

impl std::error::Error for DeviceStateError {}

impl TryFrom<u8> for DeviceState {
    type Error = DeviceStateError;

    /// Decodes the low nibble of an AL-status style register.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0x0F {
            0x01 => Ok(DeviceState::Init),
            0x02 => Ok(DeviceState::PreOperational),
            0x03 => Ok(DeviceState::Bootstrap),
            0x04 => Ok(DeviceState::SafeOperational),
            0x08 => Ok(DeviceState::Operational),
            _ => Err(DeviceStateError::InvalidValue(value)),
        }
    }
}

impl From<DeviceState> for u8 {
    fn from(state: DeviceState) -> Self {
        state as u8
    }
}
