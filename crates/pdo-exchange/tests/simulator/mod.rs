// crates/pdo-exchange/tests/simulator/mod.rs
pub mod interface;

pub use interface::SimulatedTransport;

use pdo_exchange::hal::TransportError;
use pdo_exchange::od::{DataType, PdoMapping, RegisterDescriptor, RegisterTable};
use pdo_exchange::pdo::FrameLayout;
use pdo_exchange::types::{DeviceState, RegisterId};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

pub const NODE: u16 = 1;

/// Position actual value, 4 bytes, input.
pub fn position() -> RegisterId {
    RegisterId::object(NODE, 0x6064, 0)
}

/// Status word, 2 bytes, input.
pub fn status_word() -> RegisterId {
    RegisterId::object(NODE, 0x6041, 0)
}

/// Target position, 4 bytes, output.
pub fn target_position() -> RegisterId {
    RegisterId::object(NODE, 0x607A, 0)
}

/// Device name, configuration only.
pub fn device_name() -> RegisterId {
    RegisterId::object(NODE, 0x1008, 0)
}

/// Dictionary of the simulated drive.
pub fn drive_dictionary() -> RegisterTable {
    RegisterTable::new()
        .with(
            position(),
            RegisterDescriptor::new("CL_POS_FBK_VALUE", DataType::Integer32, PdoMapping::Tx),
        )
        .with(
            status_word(),
            RegisterDescriptor::new("DRV_STATE_STATUS", DataType::Unsigned16, PdoMapping::Tx),
        )
        .with(
            target_position(),
            RegisterDescriptor::new("CL_POS_SET_POINT_VALUE", DataType::Integer32, PdoMapping::Rx),
        )
        .with(
            device_name(),
            RegisterDescriptor::new("DRV_ID_NAME", DataType::OctetString(8), PdoMapping::No),
        )
}

/// State of the virtual device behind a [`SimulatedTransport`].
#[derive(Debug)]
pub struct DeviceModel {
    pub state: DeviceState,
    /// Input image as last produced by the device.
    pub inputs: Vec<u8>,
    /// Every output image written by the engine, in order.
    pub outputs_written: Vec<Vec<u8>>,
    pub exchanges_ok: u64,
    pub exchanges_failed: u64,
    /// While set, every exchange fails with this error.
    pub failure: Option<TransportError>,
    pub exchange_delay: Duration,
    pub reject_operational: bool,
    pub max_watchdog: Option<Duration>,
    pub configured_watchdog: Option<Duration>,
    pub applied_mapping: Option<FrameLayout>,
    /// Packed mapping object values of the input image, in frame order.
    pub input_mapping: Vec<u64>,
    pub output_mapping: Vec<u64>,
    pub operational_requests: Vec<bool>,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self {
            state: DeviceState::PreOperational,
            inputs: Vec::new(),
            outputs_written: Vec::new(),
            exchanges_ok: 0,
            exchanges_failed: 0,
            failure: None,
            exchange_delay: Duration::ZERO,
            reject_operational: false,
            max_watchdog: None,
            configured_watchdog: None,
            applied_mapping: None,
            input_mapping: Vec::new(),
            output_mapping: Vec::new(),
            operational_requests: Vec::new(),
        }
    }
}

/// Test-side access to a running [`SimulatedTransport`].
#[derive(Clone)]
pub struct SimulatorHandle {
    model: Arc<Mutex<DeviceModel>>,
}

impl SimulatorHandle {
    pub fn model(&self) -> MutexGuard<'_, DeviceModel> {
        self.model.lock().unwrap()
    }

    /// Makes every following exchange fail (or succeed again with `None`).
    pub fn set_failure(&self, failure: Option<TransportError>) {
        self.model().failure = failure;
    }

    /// Changes the device state behind the engine's back.
    pub fn set_state(&self, state: DeviceState) {
        self.model().state = state;
    }

    /// Writes fixed bytes into the device's input image.
    pub fn write_input(&self, offset: usize, bytes: &[u8]) {
        let mut model = self.model();
        let end = offset + bytes.len();
        if model.inputs.len() < end {
            model.inputs.resize(end, 0);
        }
        model.inputs[offset..end].copy_from_slice(bytes);
    }

    pub fn exchanges_ok(&self) -> u64 {
        self.model().exchanges_ok
    }

    pub fn outputs_written(&self) -> Vec<Vec<u8>> {
        self.model().outputs_written.clone()
    }
}

/// Creates a transport and the handle that scripts it.
pub fn simulated_drive(max_input_bytes: usize, max_output_bytes: usize) -> (SimulatedTransport, SimulatorHandle) {
    let model = Arc::new(Mutex::new(DeviceModel::default()));
    let transport = SimulatedTransport::new(Arc::clone(&model), max_input_bytes, max_output_bytes);
    (transport, SimulatorHandle { model })
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
