// crates/pdo-exchange/src/exchange/mod.rs
//! The cyclic exchange engine: control surface on the caller's side, one
//! dedicated exchange thread while running.

mod cycle;
pub(crate) mod outputs;
pub(crate) mod state;
pub(crate) mod stats;
pub mod watchdog;

pub use state::EngineState;
pub use stats::EngineStats;
pub use watchdog::WatchdogState;

use crate::config::EngineConfig;
use crate::distribution::{Distributor, Subscription};
use crate::fault::{Fault, FaultRelay};
use crate::hal::ProcessDataTransport;
use crate::log::{EngineLogContext, ctx_debug, ctx_error, ctx_info};
use crate::od::{Dictionary, Value, ValueError};
use crate::pdo::{FrameLayout, FrameLimits, MappingTable, PdoError};
use crate::poller::Poller;
use crate::types::{Direction, RegisterId};
use core::ops::Range;
use core::time::Duration;
use crossbeam_channel::Sender;
use cycle::{CyclicLoop, LoopShared, LoopTiming};
use outputs::OutputStage;
use state::StateCell;
use stats::LoopStats;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A started exchange thread.
struct RunHandle<T> {
    thread: JoinHandle<T>,
    stop_tx: Sender<()>,
    relay: Arc<FaultRelay>,
}

/// Exchanges a fixed set of mapped registers with one device at a fixed
/// rate and distributes every received sample to the attached pollers.
///
/// The engine is `Idle` until [`start`](Self::start) succeeds. While it runs,
/// the transport lives on the exchange thread and the mapping is frozen.
/// [`stop`](Self::stop) joins the thread and hands the transport back.
pub struct CyclicEngine<T, D>
where
    T: ProcessDataTransport + 'static,
    D: Dictionary + 'static,
{
    config: EngineConfig,
    transport: Option<T>,
    dictionary: Arc<D>,
    mapping: MappingTable,
    layout: Arc<FrameLayout>,
    state: Arc<StateCell>,
    stats: Arc<LoopStats>,
    outputs: Arc<OutputStage>,
    distributor: Arc<Distributor>,
    run: Option<RunHandle<T>>,
    last_fault: Option<Fault>,
    log: EngineLogContext,
}

impl<T, D> CyclicEngine<T, D>
where
    T: ProcessDataTransport + 'static,
    D: Dictionary + 'static,
{
    pub fn new(transport: T, dictionary: D) -> Self {
        Self::with_config(transport, dictionary, EngineConfig::default())
    }

    pub fn with_config(transport: T, dictionary: D, config: EngineConfig) -> Self {
        let limits = FrameLimits::new(
            transport.max_frame_bytes(Direction::Input),
            transport.max_frame_bytes(Direction::Output),
        );
        let state = Arc::new(StateCell::default());
        let stats = Arc::new(LoopStats::default());
        let distributor = Arc::new(Distributor::new(
            config.queue_capacity,
            Arc::clone(&state),
            Arc::clone(&stats),
        ));
        let log = EngineLogContext::new(&config.name, "engine");
        ctx_debug!(
            log,
            "Engine created: frame limits {} input bytes, {} output bytes",
            limits.max_input_bytes,
            limits.max_output_bytes
        );
        Self {
            config,
            transport: Some(transport),
            dictionary: Arc::new(dictionary),
            mapping: MappingTable::new(limits),
            layout: Arc::default(),
            state,
            stats,
            outputs: Arc::default(),
            distributor,
            run: None,
            last_fault: None,
            log,
        }
    }

    // --- Queries ---

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// `true` while the exchange thread is cycling.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), EngineState::Starting | EngineState::Running)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    /// The layout derived from the current mapping.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Counters of the current run, or of the last one once stopped.
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// The fault of the current run, or of the last one once stopped.
    pub fn fault(&self) -> Option<Fault> {
        match &self.run {
            Some(run) => run.relay.fault().cloned(),
            None => self.last_fault.clone(),
        }
    }

    /// The transport, while no exchange thread owns it.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Current content of the staged output image.
    pub fn output_image(&self) -> Vec<u8> {
        self.outputs.snapshot()
    }

    // --- Mapping ---

    /// Appends one register to the mapping.
    ///
    /// Existing pollers are detached, since their sample positions refer to
    /// the previous layout.
    pub fn add_register(
        &mut self,
        register: RegisterId,
        direction: Direction,
    ) -> Result<(), PdoError> {
        self.mapping
            .add_register(self.dictionary.as_ref(), register, direction)?;
        self.mapping_changed();
        Ok(())
    }

    /// Removes every mapped register.
    pub fn clear_mapping(&mut self) -> Result<(), PdoError> {
        self.mapping.clear()?;
        self.mapping_changed();
        Ok(())
    }

    /// Replaces the whole mapping. On error the previous mapping is kept.
    pub fn configure_mapping<I>(&mut self, registers: I) -> Result<(), PdoError>
    where
        I: IntoIterator<Item = (RegisterId, Direction)>,
    {
        let mut table = MappingTable::new(self.mapping.limits());
        for (register, direction) in registers {
            table.add_register(self.dictionary.as_ref(), register, direction)?;
        }
        if self.mapping.is_locked() {
            return Err(PdoError::AlreadyRunning);
        }
        self.mapping = table;
        self.mapping_changed();
        Ok(())
    }

    fn mapping_changed(&mut self) {
        self.layout = Arc::new(self.mapping.build_layout());
        self.outputs.resize(self.layout.output_bytes());
        let detached = self.distributor.close_all();
        ctx_debug!(
            self.log,
            "Mapping changed: {} registers, {} input bytes, {} output bytes, {} subscriptions detached",
            self.mapping.len(),
            self.layout.input_bytes(),
            self.layout.output_bytes(),
            detached
        );
    }

    // --- Data ---

    /// Stages `value` for an output register. It is written at the start of
    /// the next cycle, or of the first cycle if the engine is idle.
    pub fn set_output(&self, register: &RegisterId, value: &Value) -> Result<(), PdoError> {
        self.set_outputs([(register, value)])
    }

    /// Stages several output values so that they reach the device in the
    /// same cycle. Nothing is staged if any of them fails to encode.
    pub fn set_outputs<'a, I>(&self, values: I) -> Result<(), PdoError>
    where
        I: IntoIterator<Item = (&'a RegisterId, &'a Value)>,
    {
        let encoded = values
            .into_iter()
            .map(|(register, value)| self.encode_output(register, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.outputs.stage(
            encoded
                .iter()
                .map(|(range, bytes)| (range.clone(), bytes.as_slice())),
        );
        Ok(())
    }

    fn encode_output(
        &self,
        register: &RegisterId,
        value: &Value,
    ) -> Result<(Range<usize>, Vec<u8>), PdoError> {
        let entry = self
            .layout
            .output_entry(register)
            .ok_or_else(|| PdoError::RegisterNotMapped {
                register: register.clone(),
                direction: Direction::Output,
            })?;
        let bytes = self.dictionary.encode(register, value)?;
        if bytes.len() != entry.size {
            return Err(ValueError::LengthMismatch {
                expected: entry.size,
                actual: bytes.len(),
            }
            .into());
        }
        Ok((entry.range(), bytes))
    }

    /// Attaches a raw subscription receiving every input value.
    pub fn subscribe(&self) -> Result<Subscription, PdoError> {
        self.distributor.subscribe()
    }

    /// Detaches a subscription. Dropping it has the same effect.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.distributor.unsubscribe(subscription);
    }

    /// Number of attached subscriptions, pollers included.
    pub fn subscriber_count(&self) -> usize {
        self.distributor.subscriber_count()
    }

    /// Creates a poller for some of the mapped input registers.
    pub fn poller_for(&self, registers: &[RegisterId]) -> Result<Poller, PdoError> {
        let subscription = self.distributor.subscribe()?;
        Poller::new(registers, &self.layout, subscription)
    }

    // --- Control ---

    /// Starts the exchange with a watchdog timeout derived from `period`.
    pub fn start_with_default_watchdog(&mut self, period: Duration) -> Result<(), PdoError> {
        let watchdog = self.config.derived_watchdog(period);
        self.start(period, watchdog)
    }

    /// Brings the device into operational state and starts cycling every
    /// `period`.
    ///
    /// On error the engine stays `Idle`.
    pub fn start(&mut self, period: Duration, watchdog_timeout: Duration) -> Result<(), PdoError> {
        if period < self.config.minimum_period {
            return Err(PdoError::InvalidPeriod {
                period,
                minimum: self.config.minimum_period,
            });
        }
        if watchdog_timeout.is_zero() || watchdog_timeout < period {
            return Err(PdoError::InvalidWatchdogConfig(format!(
                "timeout {:?} is shorter than the period {:?}",
                watchdog_timeout, period
            )));
        }
        if self.run.is_some() || self.state() != EngineState::Idle {
            return Err(PdoError::AlreadyRunning);
        }
        if self.layout.is_empty() {
            return Err(PdoError::EmptyMapping);
        }
        let Some(mut transport) = self.transport.take() else {
            return Err(PdoError::TransportUnavailable);
        };

        self.state.set(EngineState::Starting);
        if let Err(e) = transport.configure_watchdog(watchdog_timeout) {
            self.transport = Some(transport);
            self.state.set(EngineState::Idle);
            return Err(PdoError::InvalidWatchdogConfig(e.to_string()));
        }
        if let Err(e) = transport
            .apply_mapping(&self.layout)
            .and_then(|()| transport.set_operational(true))
        {
            ctx_error!(self.log, "Device did not enter operational state: {}", e);
            self.transport = Some(transport);
            self.state.set(EngineState::Idle);
            return Err(PdoError::DeviceTransitionFailed(e));
        }

        self.mapping.set_locked(true);
        self.outputs.mark_dirty();
        self.stats.reset();
        self.last_fault = None;

        let relay = Arc::new(FaultRelay::new(
            Arc::clone(&self.distributor),
            EngineLogContext::new(&self.config.name, "relay"),
        ));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let cycle_loop = CyclicLoop {
            transport,
            dictionary: Arc::clone(&self.dictionary),
            layout: Arc::clone(&self.layout),
            timing: LoopTiming {
                period,
                watchdog: watchdog_timeout,
                spin_threshold: self.config.spin_threshold,
            },
            shared: LoopShared {
                state: Arc::clone(&self.state),
                stats: Arc::clone(&self.stats),
                outputs: Arc::clone(&self.outputs),
                distributor: Arc::clone(&self.distributor),
                relay: Arc::clone(&relay),
            },
            stop_rx,
            log: EngineLogContext::new(&self.config.name, "loop"),
        };

        // Running before the thread exists, so a fault on the first cycle
        // can move the engine to Faulted.
        self.state.set(EngineState::Running);
        let spawned = thread::Builder::new()
            .name(format!("{}-exchange", self.config.name))
            .spawn(move || cycle_loop.run());
        match spawned {
            Ok(thread) => {
                self.run = Some(RunHandle {
                    thread,
                    stop_tx,
                    relay,
                });
                ctx_info!(
                    self.log,
                    "Exchange running: period {:?}, watchdog {:?}",
                    period,
                    watchdog_timeout
                );
                Ok(())
            }
            Err(e) => {
                // The transport went down with the closure.
                ctx_error!(self.log, "Could not spawn the exchange thread: {}", e);
                self.mapping.set_locked(false);
                self.state.set(EngineState::Idle);
                Err(PdoError::Spawn(e.to_string()))
            }
        }
    }

    /// Ends the exchange after the current cycle and waits for the thread.
    ///
    /// Every subscription is detached; pollers keep what they had buffered
    /// and any fault. Calling `stop` on an idle engine does nothing.
    pub fn stop(&mut self) -> Result<(), PdoError> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };
        self.state.set(EngineState::Stopping);
        // The loop may have exited on a fault and dropped its receiver.
        let _ = run.stop_tx.try_send(());
        let joined = run.thread.join();

        self.distributor.close_all();
        self.mapping.set_locked(false);
        self.last_fault = run.relay.fault().cloned();
        self.state.set(EngineState::Idle);

        match joined {
            Ok(transport) => {
                self.transport = Some(transport);
                ctx_info!(self.log, "Exchange stopped");
                Ok(())
            }
            Err(_) => {
                ctx_error!(self.log, "Exchange thread panicked, transport lost");
                Err(PdoError::TransportUnavailable)
            }
        }
    }
}

impl<T, D> Drop for CyclicEngine<T, D>
where
    T: ProcessDataTransport + 'static,
    D: Dictionary + 'static,
{
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl<T, D> core::fmt::Debug for CyclicEngine<T, D>
where
    T: ProcessDataTransport + 'static,
    D: Dictionary + 'static,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CyclicEngine")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .field("mapping", &self.mapping)
            .field("fault", &self.fault())
            .finish()
    }
}
