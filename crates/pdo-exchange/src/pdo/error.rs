use crate::exchange::EngineState;
use crate::hal::TransportError;
use crate::od::ValueError;
use crate::types::{Direction, RegisterId};
use core::time::Duration;

/// Errors returned synchronously by the mapping and engine control surface.
///
/// Asynchronous failures of a running exchange are never returned here; they
/// reach pollers as a [`Fault`](crate::fault::Fault).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdoError {
    /// The register's access qualifier forbids cyclic mapping.
    NotCyclicCapable { register: RegisterId },
    /// The register is cyclic but may not be mapped in this direction.
    DirectionNotAllowed {
        register: RegisterId,
        direction: Direction,
    },
    /// The dictionary does not know the register's width.
    UnknownRegister { register: RegisterId },
    /// Adding the register would exceed the transport's frame size.
    FrameOverflow {
        direction: Direction,
        required: usize,
        max: usize,
    },
    /// The operation needs an idle engine.
    AlreadyRunning,
    /// `start` was called without any mapped register.
    EmptyMapping,
    /// The requested period is below the supported minimum.
    InvalidPeriod { period: Duration, minimum: Duration },
    /// The watchdog timeout is shorter than one period or was rejected by the device.
    InvalidWatchdogConfig(String),
    /// The device could not be brought into operational state.
    DeviceTransitionFailed(TransportError),
    /// The register is not part of the image it was used with.
    RegisterNotMapped {
        register: RegisterId,
        direction: Direction,
    },
    /// New subscriptions are refused while the engine is in this state.
    SubscriptionRefused(EngineState),
    /// A value could not be encoded for an output register.
    Value(ValueError),
    /// The transport was lost when the exchange thread panicked.
    TransportUnavailable,
    /// The exchange thread could not be spawned.
    Spawn(String),
}

impl std::error::Error for PdoError {}

impl core::fmt::Display for PdoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotCyclicCapable { register } => {
                write!(f, "PDO mapping error: register {} is not cyclic-capable", register)
            }
            Self::DirectionNotAllowed {
                register,
                direction,
            } => write!(
                f,
                "PDO mapping error: register {} cannot be mapped as {}",
                register, direction
            ),
            Self::UnknownRegister { register } => {
                write!(f, "PDO mapping error: register {} not found in dictionary", register)
            }
            Self::FrameOverflow {
                direction,
                required,
                max,
            } => write!(
                f,
                "PDO mapping error: {} image would need {} bytes, transport allows {}",
                direction, required, max
            ),
            Self::AlreadyRunning => write!(f, "Process data exchange is already active"),
            Self::EmptyMapping => write!(f, "No register mapped, nothing to exchange"),
            Self::InvalidPeriod { period, minimum } => write!(
                f,
                "Refresh period {:?} is below the minimum of {:?}",
                period, minimum
            ),
            Self::InvalidWatchdogConfig(s) => write!(f, "Invalid watchdog configuration: {}", s),
            Self::DeviceTransitionFailed(e) => {
                write!(f, "Could not start the process data exchange: {}", e)
            }
            Self::RegisterNotMapped {
                register,
                direction,
            } => write!(
                f,
                "Register {} is not mapped in the {} image",
                register, direction
            ),
            Self::SubscriptionRefused(state) => {
                write!(f, "Cannot subscribe while the engine is {:?}", state)
            }
            Self::Value(e) => write!(f, "Value error: {}", e),
            Self::TransportUnavailable => {
                write!(f, "Transport lost after the exchange thread terminated abnormally")
            }
            Self::Spawn(s) => write!(f, "Could not spawn the exchange thread: {}", s),
        }
    }
}

impl From<ValueError> for PdoError {
    fn from(error: ValueError) -> Self {
        PdoError::Value(error)
    }
}
