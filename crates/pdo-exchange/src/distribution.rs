// crates/pdo-exchange/src/distribution.rs
//! Fan-out of samples from the exchange thread to any number of subscribers.
//!
//! Each subscription is a bounded crossbeam channel. The publisher keeps a
//! second receiver on every channel so that, when a queue is full, it can
//! evict the oldest sample itself instead of waiting for the subscriber.
//! Publishing therefore never blocks on a slow consumer.

use crate::exchange::EngineState;
use crate::exchange::state::StateCell;
use crate::exchange::stats::LoopStats;
use crate::fault::Fault;
use crate::od::Value;
use crate::pdo::PdoError;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, trace};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

/// Values received in one successful exchange cycle.
///
/// `values` follows the input order of the frame layout that produced it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    timestamp: Duration,
    cycle: u64,
    values: Vec<Value>,
}

impl Sample {
    pub(crate) fn new(timestamp: Duration, cycle: u64, values: Vec<Value>) -> Self {
        Self {
            timestamp,
            cycle,
            values,
        }
    }

    /// Monotonic time since the exchange was started.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Loop iteration that produced the sample (1-based).
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Exception slot of a subscription. Set at most once.
type FaultSlot = Arc<OnceLock<Fault>>;

struct Slot {
    id: u64,
    tx: Sender<Arc<Sample>>,
    /// Publisher-side receiver used to drop the oldest sample of a full queue.
    evict: Receiver<Arc<Sample>>,
    fault: FaultSlot,
}

/// Attached slots and the fault of the current run, guarded together so a
/// subscription is either refused or sees the fault.
#[derive(Default)]
struct Slots {
    entries: Vec<Slot>,
    fault: Option<Fault>,
}

/// Thread-safe, multi-subscriber sample fan-out.
pub struct Distributor {
    slots: Mutex<Slots>,
    next_id: AtomicU64,
    capacity: usize,
    state: Arc<StateCell>,
    stats: Arc<LoopStats>,
}

impl Distributor {
    pub(crate) fn new(capacity: usize, state: Arc<StateCell>, stats: Arc<LoopStats>) -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            state,
            stats,
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capacity of every subscription queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of attached subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock_slots().entries.len()
    }

    /// Attaches a new subscription.
    ///
    /// Refused while the engine is `Faulted` or `Stopping`, and once a fault
    /// was published for the current run.
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, PdoError> {
        let mut slots = self.lock_slots();
        let state = self.state.get();
        if matches!(state, EngineState::Faulted | EngineState::Stopping) {
            return Err(PdoError::SubscriptionRefused(state));
        }
        if slots.fault.is_some() {
            return Err(PdoError::SubscriptionRefused(EngineState::Faulted));
        }
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let fault = FaultSlot::default();
        slots.entries.push(Slot {
            id,
            tx,
            evict: rx.clone(),
            fault: Arc::clone(&fault),
        });
        drop(slots);
        debug!("Subscription {} attached (capacity {})", id, self.capacity);
        Ok(Subscription {
            id,
            rx,
            fault,
            closed: AtomicBool::new(false),
            distributor: Arc::downgrade(self),
        })
    }

    /// Enqueues `sample` on every subscription without blocking.
    ///
    /// A full queue loses its oldest sample. Returns the number of samples
    /// dropped this way.
    pub fn publish(&self, sample: Arc<Sample>) -> usize {
        let slots = self.lock_slots();
        let mut dropped = 0;
        for slot in slots.entries.iter() {
            let mut pending = Arc::clone(&sample);
            loop {
                match slot.tx.try_send(pending) {
                    Ok(()) => break,
                    Err(TrySendError::Full(returned)) => {
                        if slot.evict.try_recv().is_ok() {
                            dropped += 1;
                            self.stats.sample_dropped();
                            trace!("Subscription {} full, oldest sample dropped", slot.id);
                        }
                        pending = returned;
                    }
                    // Cannot happen while `evict` is alive.
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }
        dropped
    }

    /// Sets `fault` in the exception slot of every subscription.
    ///
    /// Slots that already hold a fault keep it. Until [`close_all`] the
    /// distributor refuses new subscriptions.
    ///
    /// [`close_all`]: Distributor::close_all
    pub fn publish_fault(&self, fault: &Fault) {
        let mut slots = self.lock_slots();
        slots.fault.get_or_insert_with(|| fault.clone());
        for slot in slots.entries.iter() {
            let _ = slot.fault.set(fault.clone());
        }
    }

    /// Detaches and discards a subscription. Safe to call while publishing.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    fn remove(&self, id: u64) {
        let mut slots = self.lock_slots();
        if let Some(index) = slots.entries.iter().position(|slot| slot.id == id) {
            slots.entries.remove(index);
            debug!("Subscription {} detached", id);
        }
    }

    /// Detaches every subscription. Subscribers can still drain what they
    /// had buffered and read their fault slot. Clears the fault of the run.
    pub(crate) fn close_all(&self) -> usize {
        let mut slots = self.lock_slots();
        let count = slots.entries.len();
        slots.entries.clear();
        slots.fault = None;
        count
    }
}

/// A subscriber's end of the distribution point: a bounded sample queue
/// plus an exception slot.
///
/// Dropping it detaches it from the [`Distributor`].
pub struct Subscription {
    id: u64,
    rx: Receiver<Arc<Sample>>,
    fault: FaultSlot,
    closed: AtomicBool,
    distributor: Weak<Distributor>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Samples currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// The fault delivered to this subscription, if any.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.get()
    }

    /// `true` once the distributor detached this subscription and every
    /// buffered sample was taken.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Takes every buffered sample, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Arc<Sample>> {
        let mut samples = Vec::with_capacity(self.rx.len());
        loop {
            match self.rx.try_recv() {
                Ok(sample) => samples.push(sample),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed.store(true, Ordering::Release);
                    break;
                }
            }
        }
        samples
    }

    /// Takes every buffered sample; once nothing is left and a fault was
    /// delivered, returns the fault instead, on every call.
    pub fn read(&self) -> Result<Vec<Arc<Sample>>, Fault> {
        let fault = self.fault.get().cloned();
        let samples = self.drain();
        match fault {
            Some(fault) if samples.is_empty() => Err(fault),
            _ => Ok(samples),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(distributor) = self.distributor.upgrade() {
            distributor.remove(self.id);
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("buffered", &self.rx.len())
            .field("fault", &self.fault.get())
            .finish()
    }
}
