// crates/pdo-exchange/tests/simulator/interface.rs
use super::DeviceModel;
use pdo_exchange::hal::{ProcessDataTransport, TransportError};
use pdo_exchange::pdo::{FrameLayout, PdoMappingEntry};
use pdo_exchange::types::{DeviceState, Direction};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// A transport that exchanges process data with an in-memory [`DeviceModel`].
///
/// The model is shared with a [`SimulatorHandle`](super::SimulatorHandle), so
/// tests can script failures while the transport lives on the exchange thread.
pub struct SimulatedTransport {
    model: Arc<Mutex<DeviceModel>>,
    max_input_bytes: usize,
    max_output_bytes: usize,
}

impl SimulatedTransport {
    pub fn new(model: Arc<Mutex<DeviceModel>>, max_input_bytes: usize, max_output_bytes: usize) -> Self {
        Self {
            model,
            max_input_bytes,
            max_output_bytes,
        }
    }

    fn model(&self) -> MutexGuard<'_, DeviceModel> {
        self.model.lock().unwrap()
    }
}

impl ProcessDataTransport for SimulatedTransport {
    fn exchange_cycle(&mut self) -> Result<(), TransportError> {
        let delay = self.model().exchange_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut model = self.model();
        if let Some(error) = model.failure.clone() {
            model.exchanges_failed += 1;
            return Err(error);
        }
        model.exchanges_ok += 1;
        // The device reports its cycle counter in the first four input bytes.
        let counter = model.exchanges_ok as i32;
        if model.inputs.len() >= 4 {
            model.inputs[..4].copy_from_slice(&counter.to_le_bytes());
        }
        Ok(())
    }

    fn write_outputs(&mut self, frame: &[u8]) {
        self.model().outputs_written.push(frame.to_vec());
    }

    fn read_inputs(&mut self, buffer: &mut [u8]) -> Result<usize, TransportError> {
        let model = self.model();
        let len = model.inputs.len().min(buffer.len());
        buffer[..len].copy_from_slice(&model.inputs[..len]);
        Ok(len)
    }

    fn set_operational(&mut self, operational: bool) -> Result<(), TransportError> {
        let mut model = self.model();
        model.operational_requests.push(operational);
        if operational && model.reject_operational {
            return Err(TransportError::StateTransition {
                requested: DeviceState::Operational,
                actual: model.state,
            });
        }
        model.state = if operational {
            DeviceState::Operational
        } else {
            DeviceState::PreOperational
        };
        Ok(())
    }

    fn device_state(&mut self) -> Result<DeviceState, TransportError> {
        Ok(self.model().state)
    }

    fn max_frame_bytes(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.max_input_bytes,
            Direction::Output => self.max_output_bytes,
        }
    }

    fn configure_watchdog(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let mut model = self.model();
        if let Some(max) = model.max_watchdog {
            if timeout > max {
                return Err(TransportError::Rejected(format!(
                    "watchdog {:?} above device maximum {:?}",
                    timeout, max
                )));
            }
        }
        model.configured_watchdog = Some(timeout);
        Ok(())
    }

    fn apply_mapping(&mut self, layout: &FrameLayout) -> Result<(), TransportError> {
        let packed = |direction: Direction| {
            layout
                .mapping_entries(direction)
                .map(|entries| {
                    entries
                        .into_iter()
                        .map(PdoMappingEntry::to_u64)
                        .collect::<Vec<u64>>()
                })
                .ok_or_else(|| {
                    TransportError::Rejected("register without an object index".to_string())
                })
        };
        let input_mapping = packed(Direction::Input)?;
        let output_mapping = packed(Direction::Output)?;

        let mut model = self.model();
        model.inputs.resize(layout.input_bytes(), 0);
        model.input_mapping = input_mapping;
        model.output_mapping = output_mapping;
        model.applied_mapping = Some(layout.clone());
        Ok(())
    }
}
