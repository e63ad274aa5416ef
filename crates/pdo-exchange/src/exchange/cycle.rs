// crates/pdo-exchange/src/exchange/cycle.rs
use super::outputs::OutputStage;
use super::state::{EngineState, StateCell};
use super::stats::LoopStats;
use super::watchdog::WatchdogState;
use crate::distribution::{Distributor, Sample};
use crate::fault::{Fault, FaultKind, FaultRelay};
use crate::hal::{ProcessDataTransport, TransportError};
use crate::log::{
    CycleLogContext, EngineLogContext, ctx_debug, ctx_info, ctx_trace, ctx_warn,
};
use crate::od::{Dictionary, Value};
use crate::pdo::FrameLayout;
use crate::types::DeviceState;
use core::time::Duration;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a failed cycle.
enum CycleError {
    /// Tolerated until the watchdog expires.
    Transient(TransportError),
    /// Ends the run immediately.
    Fatal(FaultKind, String),
}

/// Handles shared between the engine and its exchange thread.
pub(crate) struct LoopShared {
    pub(crate) state: Arc<StateCell>,
    pub(crate) stats: Arc<LoopStats>,
    pub(crate) outputs: Arc<OutputStage>,
    pub(crate) distributor: Arc<Distributor>,
    pub(crate) relay: Arc<FaultRelay>,
}

/// Timing of one run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopTiming {
    pub(crate) period: Duration,
    pub(crate) watchdog: Duration,
    pub(crate) spin_threshold: Duration,
}

/// Body of the exchange thread. Owns the transport for the whole run and
/// returns it when the loop ends.
pub(crate) struct CyclicLoop<T, D> {
    pub(crate) transport: T,
    pub(crate) dictionary: Arc<D>,
    pub(crate) layout: Arc<FrameLayout>,
    pub(crate) timing: LoopTiming,
    pub(crate) shared: LoopShared,
    pub(crate) stop_rx: Receiver<()>,
    pub(crate) log: EngineLogContext,
}

/// Per-run bookkeeping that lives on the exchange thread only.
struct RunClock {
    started: Instant,
    watchdog: WatchdogState,
    last_iteration: Duration,
    consecutive_failures: u64,
}

impl RunClock {
    /// Detail of a watchdog fault detected at `now`. `iteration` is the time
    /// spent in the current loop iteration so far.
    fn expiry_detail(&self, now: Instant, iteration: Duration, cause: &str) -> String {
        let timeout = self.watchdog.timeout();
        let mut detail = format!(
            "No successful exchange for {:?} (watchdog {:?}), {}",
            self.watchdog.elapsed(now),
            timeout,
            cause
        );
        let slowest = iteration.max(self.last_iteration);
        if slowest > timeout {
            detail.push_str(&format!(
                ". An iteration took {:?}, longer than the watchdog timeout",
                slowest
            ));
        }
        detail
    }
}

impl<T, D> CyclicLoop<T, D>
where
    T: ProcessDataTransport,
    D: Dictionary,
{
    pub(crate) fn run(mut self) -> T {
        let started = Instant::now();
        let mut clock = RunClock {
            started,
            watchdog: WatchdogState::new(self.timing.watchdog, started),
            last_iteration: Duration::ZERO,
            consecutive_failures: 0,
        };
        let mut inputs = vec![0u8; self.layout.input_bytes()];
        let mut outputs = Vec::with_capacity(self.layout.output_bytes());
        let mut deadline = started;
        let mut cycle: u64 = 0;

        ctx_info!(
            self.log,
            "Exchange started: period {:?}, watchdog {:?}, {} input bytes, {} output bytes",
            self.timing.period,
            self.timing.watchdog,
            self.layout.input_bytes(),
            self.layout.output_bytes()
        );

        loop {
            cycle += 1;
            let begin = Instant::now();
            self.shared.stats.cycle_started();

            let result = self.run_cycle(cycle, begin, &mut clock, &mut inputs, &mut outputs);
            if let Some(fault) = self.check_result(result, cycle, begin, &mut clock) {
                self.shared.relay.report(fault);
                self.shared
                    .state
                    .transition(EngineState::Running, EngineState::Faulted);
                break;
            }

            clock.last_iteration = begin.elapsed();
            self.shared.stats.cycle_duration(clock.last_iteration);

            // Fixed schedule. An overrun restarts the schedule from now, so
            // late cycles are neither compounded nor caught up in a burst.
            deadline += self.timing.period;
            let now = Instant::now();
            if now >= deadline {
                let overruns = self.shared.stats.overrun();
                ctx_warn!(
                    CycleLogContext {
                        base: &self.log,
                        cycle
                    },
                    "Cycle overran its period by {:?} ({} overruns so far)",
                    now.duration_since(deadline),
                    overruns
                );
                deadline = now;
                if self.stop_requested() {
                    break;
                }
            } else if self.wait_until(deadline) {
                break;
            }
        }

        if let Err(e) = self.transport.set_operational(false) {
            ctx_warn!(self.log, "Could not leave operational state: {}", e);
        }
        ctx_info!(self.log, "Exchange stopped after {} cycles", cycle);
        self.transport
    }

    /// Performs one cycle: outputs, exchange, state check, inputs, publish.
    fn run_cycle(
        &mut self,
        cycle: u64,
        begin: Instant,
        clock: &mut RunClock,
        inputs: &mut [u8],
        outputs: &mut Vec<u8>,
    ) -> Result<(), CycleError> {
        let ctx = CycleLogContext {
            base: &self.log,
            cycle,
        };

        if self.shared.outputs.take_pending(outputs) {
            ctx_trace!(ctx, "Writing {} output bytes", outputs.len());
            self.transport.write_outputs(outputs);
        }

        self.transport.exchange_cycle().map_err(|e| match e {
            TransportError::StateTransition { .. } => {
                CycleError::Fatal(FaultKind::DeviceTransitionFailed, e.to_string())
            }
            e => CycleError::Transient(e),
        })?;

        match self.transport.device_state().map_err(CycleError::Transient)? {
            DeviceState::Operational => {}
            state => {
                return Err(CycleError::Fatal(
                    FaultKind::UnexpectedStateChange,
                    format!("Device left operational state, it is now in {:?}", state),
                ));
            }
        }

        let received = self
            .transport
            .read_inputs(inputs)
            .map_err(CycleError::Transient)?;
        if received < inputs.len() {
            return Err(CycleError::Transient(TransportError::Io(format!(
                "Short input image: {} of {} bytes",
                received,
                inputs.len()
            ))));
        }

        // A late exchange does not rescue an expired watchdog.
        let now = Instant::now();
        if clock.watchdog.is_expired(now) {
            let detail = clock.expiry_detail(
                now,
                now.saturating_duration_since(begin),
                "the last exchange arrived too late",
            );
            return Err(CycleError::Fatal(FaultKind::WatchdogExpired, detail));
        }
        let values = self.decode_inputs(inputs, &ctx);
        clock.watchdog.refresh(now);
        self.shared.stats.exchange_ok();

        let sample = Sample::new(now.duration_since(clock.started), cycle, values);
        self.shared.distributor.publish(Arc::new(sample));
        self.shared.stats.sample_published();
        ctx_trace!(ctx, "Sample published");
        Ok(())
    }

    fn decode_inputs(&self, inputs: &[u8], ctx: &CycleLogContext<'_>) -> Vec<Value> {
        self.layout
            .inputs()
            .iter()
            .map(|entry| {
                let bytes = inputs.get(entry.range()).unwrap_or_default();
                self.dictionary
                    .decode(&entry.register, bytes)
                    .unwrap_or_else(|e| {
                        ctx_warn!(*ctx, "Cannot decode {}: {}", entry.register, e);
                        Value::OctetString(bytes.to_vec())
                    })
            })
            .collect()
    }

    /// Turns the cycle result into a fault when the run has to end.
    fn check_result(
        &self,
        result: Result<(), CycleError>,
        cycle: u64,
        begin: Instant,
        clock: &mut RunClock,
    ) -> Option<Fault> {
        let ctx = CycleLogContext {
            base: &self.log,
            cycle,
        };
        let now = Instant::now();
        let at = now.duration_since(clock.started);
        match result {
            Ok(()) => {
                if clock.consecutive_failures > 0 {
                    ctx_info!(
                        ctx,
                        "Exchange recovered after {} failed cycles",
                        clock.consecutive_failures
                    );
                    clock.consecutive_failures = 0;
                }
                None
            }
            Err(CycleError::Fatal(kind, detail)) => {
                if kind != FaultKind::WatchdogExpired {
                    self.shared.stats.exchange_failed();
                }
                Some(Fault::new(kind, detail, at, cycle))
            }
            Err(CycleError::Transient(error)) => {
                self.shared.stats.exchange_failed();
                clock.consecutive_failures += 1;
                let elapsed = clock.watchdog.elapsed(now);
                if clock.watchdog.is_expired(now) {
                    let cause = format!("last error: {}", error);
                    let detail = clock.expiry_detail(now, now.saturating_duration_since(begin), &cause);
                    return Some(Fault::new(FaultKind::WatchdogExpired, detail, at, cycle));
                }
                if clock.consecutive_failures == 1 {
                    ctx_warn!(ctx, "Exchange failed, retrying: {}", error);
                } else {
                    ctx_debug!(
                        ctx,
                        "Exchange failed {} times in a row ({:?} of {:?}): {}",
                        clock.consecutive_failures,
                        elapsed,
                        clock.watchdog.timeout(),
                        error
                    );
                }
                None
            }
        }
    }

    fn stop_requested(&self) -> bool {
        match self.stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    /// Sleeps until shortly before `deadline`, then spins the remainder.
    ///
    /// Returns `true` if a stop was requested during the wait.
    fn wait_until(&self, deadline: Instant) -> bool {
        let coarse = deadline
            .checked_sub(self.timing.spin_threshold)
            .unwrap_or(deadline);
        match self.stop_rx.recv_deadline(coarse) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => {}
        }
        while Instant::now() < deadline {
            core::hint::spin_loop();
        }
        false
    }
}
