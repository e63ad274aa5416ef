use crate::pdo::FrameLayout;
use crate::types::{DeviceState, Direction};
use core::fmt;
use core::time::Duration;

/// Errors reported by a process-data transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No answer within the transport's own receive timeout.
    Timeout,
    /// The frame came back, but not every device processed it.
    WorkingCounter { expected: u16, received: u16 },
    /// An underlying I/O error occurred.
    Io(String),
    /// The device refused or did not complete a requested state transition.
    StateTransition { requested: DeviceState, actual: DeviceState },
    /// The device rejected a configuration value (e.g. a watchdog time out of range).
    Rejected(String),
    /// The operation is not available on this transport.
    NotSupported,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Process data exchange timed out"),
            Self::WorkingCounter { expected, received } => write!(
                f,
                "Wrong working counter: expected {}, received {}",
                expected, received
            ),
            Self::Io(s) => write!(f, "Transport I/O error: {}", s),
            Self::StateTransition { requested, actual } => write!(
                f,
                "Device did not reach {:?}, it is in {:?}",
                requested, actual
            ),
            Self::Rejected(s) => write!(f, "Device rejected configuration: {}", s),
            Self::NotSupported => write!(f, "Operation not supported by the transport"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Hardware Abstraction Layer for cyclic process-data exchange.
///
/// This trait keeps the exchange engine independent of the fieldbus
/// (EtherCAT, CANopen, POWERLINK...) and of the platform driver. The engine
/// moves the transport onto its exchange thread while running and hands it
/// back on `stop()`, so implementations only need to be `Send`.
pub trait ProcessDataTransport: Send {
    /// Performs one complete process-data cycle: sends the staged output
    /// image and receives the input image.
    ///
    /// This call may block, bounded by the transport's own timeout.
    fn exchange_cycle(&mut self) -> Result<(), TransportError>;

    /// Stages the output image for the next `exchange_cycle`.
    ///
    /// `frame` is the complete output image laid out as the mapping describes.
    fn write_outputs(&mut self, frame: &[u8]);

    /// Copies the input image received by the last successful cycle into `buffer`.
    ///
    /// Returns the number of bytes written.
    fn read_inputs(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError>;

    /// Requests the device to enter (`true`) or leave (`false`) the
    /// operational communication state.
    fn set_operational(&mut self, operational: bool) -> Result<(), TransportError>;

    /// Reads back the current communication state of the device.
    fn device_state(&mut self) -> Result<DeviceState, TransportError>;

    /// The largest process-data image the transport can carry in `direction`.
    fn max_frame_bytes(&self, direction: Direction) -> usize;

    /// Programs the device-side process-data watchdog.
    ///
    /// Transports without a device watchdog keep the default no-op.
    fn configure_watchdog(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let _ = timeout;
        Ok(())
    }

    /// Pushes the frame layout to the device before it goes operational.
    ///
    /// [`FrameLayout::mapping_entries`] gives the CiA 301 encoding for
    /// registers addressed by index. The default does nothing, for devices
    /// whose mapping is fixed or configured out of band.
    fn apply_mapping(&mut self, layout: &FrameLayout) -> Result<(), TransportError> {
        let _ = layout;
        Ok(())
    }
}
