// crates/pdo-exchange/tests/fault_test.rs

#[allow(dead_code)]
mod simulator;

use pdo_exchange::{
    CyclicEngine, DeviceState, Direction, EngineState, FaultKind, PdoError, Poller, PollerState,
    RegisterTable, TransportError,
};
use simulator::{
    SimulatedTransport, SimulatorHandle, drive_dictionary, init_logger, position, simulated_drive,
    status_word, wait_for,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const MS: Duration = Duration::from_millis(1);
const SETTLE: Duration = Duration::from_secs(2);

type Engine = CyclicEngine<SimulatedTransport, RegisterTable>;

fn mapped_engine() -> (Engine, SimulatorHandle) {
    init_logger();
    let (transport, handle) = simulated_drive(64, 64);
    let mut engine = CyclicEngine::new(transport, drive_dictionary());
    engine
        .configure_mapping([
            (position(), Direction::Input),
            (status_word(), Direction::Input),
        ])
        .unwrap();
    (engine, handle)
}

/// Poller whose exception callbacks are counted.
fn counted_poller(engine: &Engine) -> (Poller, Arc<AtomicUsize>) {
    let mut poller = engine.poller_for(&[position()]).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    poller.on_exception(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (poller, calls)
}

fn wait_for_state(engine: &Engine, state: EngineState) -> bool {
    wait_for(SETTLE, || engine.state() == state)
}

#[test]
fn test_short_failure_is_absorbed() {
    let (mut engine, handle) = mapped_engine();
    let (mut poller, calls) = counted_poller(&engine);

    engine.start(5 * MS, 200 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 3));

    handle.set_failure(Some(TransportError::Timeout));
    thread::sleep(30 * MS);
    handle.set_failure(None);
    let resumed = handle.exchanges_ok();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= resumed + 5));

    let mut samples = poller.read();
    assert_eq!(poller.state(), PollerState::Attached);
    assert_eq!(engine.state(), EngineState::Running);
    assert!(engine.fault().is_none());

    engine.stop().unwrap();
    samples.extend(poller.read());
    assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(samples.len() as u64, engine.stats().samples_published);
    assert_eq!(samples.len() as u64, handle.exchanges_ok());
    assert!(engine.stats().exchanges_failed > 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(engine.fault().is_none());
}

#[test]
fn test_long_failure_raises_one_fault_per_poller() {
    let (mut engine, handle) = mapped_engine();
    let (mut first, first_calls) = counted_poller(&engine);
    let (mut second, second_calls) = counted_poller(&engine);

    engine.start(5 * MS, 50 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 3));
    handle.set_failure(Some(TransportError::Timeout));
    assert!(wait_for_state(&engine, EngineState::Faulted));
    assert!(!engine.is_active());

    // Samples received before the fault come first, then the callback.
    let delivered = first.read();
    assert_eq!(delivered.len() as u64, handle.exchanges_ok());
    for _ in 0..3 {
        assert!(first.read().is_empty());
        second.read();
    }
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.state(), PollerState::Faulted);

    let fault = first.fault().cloned().unwrap();
    assert_eq!(fault.kind, FaultKind::WatchdogExpired);
    assert!(fault.detail.contains("timed out"), "{}", fault.detail);
    assert_eq!(second.fault(), Some(&fault));
    assert_eq!(engine.fault(), Some(fault.clone()));

    assert!(matches!(
        engine.poller_for(&[position()]),
        Err(PdoError::SubscriptionRefused(EngineState::Faulted))
    ));

    engine.stop().unwrap();
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.fault(), Some(fault));
    assert_eq!(handle.model().operational_requests, [true, false]);
    assert!(engine.stop().is_ok());
}

#[test]
fn test_unexpected_state_change_is_fatal() {
    let (mut engine, handle) = mapped_engine();
    let (mut poller, calls) = counted_poller(&engine);

    engine.start(5 * MS, 100 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 2));
    handle.set_state(DeviceState::SafeOperational);
    assert!(wait_for_state(&engine, EngineState::Faulted));

    poller.read();
    poller.read();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let fault = poller.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::UnexpectedStateChange);
    assert!(fault.detail.contains("SafeOperational"));

    engine.stop().unwrap();
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn test_refused_transition_during_run_is_fatal() {
    let (mut engine, handle) = mapped_engine();
    let (mut poller, _calls) = counted_poller(&engine);

    engine.start(5 * MS, 100 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 2));
    handle.set_failure(Some(TransportError::StateTransition {
        requested: DeviceState::Operational,
        actual: DeviceState::PreOperational,
    }));
    assert!(wait_for_state(&engine, EngineState::Faulted));

    poller.read();
    assert_eq!(
        poller.fault().map(|fault| fault.kind),
        Some(FaultKind::DeviceTransitionFailed)
    );
    engine.stop().unwrap();
}

#[test]
fn test_overrunning_cycles_start_immediately() {
    let (mut engine, handle) = mapped_engine();
    handle.model().exchange_delay = 8 * MS;

    engine.start(5 * MS, 100 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 6));
    engine.stop().unwrap();

    let stats = engine.stats();
    assert!(stats.overruns >= 5, "{:?}", stats);
    assert!(stats.max_cycle >= 8 * MS);
    assert_eq!(stats.exchanges_failed, 0);
    assert!(engine.fault().is_none());
}

#[test]
fn test_slow_successful_exchanges_expire_the_watchdog() {
    let (mut engine, handle) = mapped_engine();
    let (mut first, first_calls) = counted_poller(&engine);
    let (mut second, second_calls) = counted_poller(&engine);

    engine.start(5 * MS, 25 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 3));
    // Every exchange still succeeds, just too late.
    handle.model().exchange_delay = 40 * MS;
    assert!(wait_for_state(&engine, EngineState::Faulted));

    // The late exchange itself is not delivered.
    let delivered = first.read();
    assert_eq!(delivered.len() as u64 + 1, handle.exchanges_ok());
    first.read();
    second.read();
    second.read();
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);

    let fault = first.fault().cloned().unwrap();
    assert_eq!(fault.kind, FaultKind::WatchdogExpired);
    assert!(fault.detail.contains("arrived too late"), "{}", fault.detail);
    assert!(
        fault.detail.contains("longer than the watchdog timeout"),
        "{}",
        fault.detail
    );
    assert_eq!(second.fault(), Some(&fault));
    assert_eq!(handle.model().exchanges_failed, 0);
    assert_eq!(engine.stats().exchanges_failed, 0);
    engine.stop().unwrap();
}

#[test]
fn test_watchdog_fault_mentions_slow_iteration() {
    let (mut engine, handle) = mapped_engine();
    let (mut poller, _calls) = counted_poller(&engine);

    engine.start(10 * MS, 20 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 2));
    {
        let mut model = handle.model();
        model.exchange_delay = 30 * MS;
        model.failure = Some(TransportError::Io("cable unplugged".to_string()));
    }
    assert!(wait_for_state(&engine, EngineState::Faulted));

    poller.read();
    let fault = poller.fault().unwrap();
    assert_eq!(fault.kind, FaultKind::WatchdogExpired);
    assert!(fault.detail.contains("cable unplugged"), "{}", fault.detail);
    assert!(
        fault.detail.contains("longer than the watchdog timeout"),
        "{}",
        fault.detail
    );
    engine.stop().unwrap();
}

#[test]
fn test_dropping_a_running_engine_stops_it() {
    let (mut engine, handle) = mapped_engine();
    engine.start(5 * MS, 100 * MS).unwrap();
    assert!(wait_for(SETTLE, || handle.exchanges_ok() >= 2));
    drop(engine);

    let model = handle.model();
    assert_eq!(model.operational_requests, [true, false]);
    assert_eq!(model.state, DeviceState::PreOperational);
}
