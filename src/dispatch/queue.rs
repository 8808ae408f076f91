//! Bounded asynchronous hand-off between firing threads and delivery.

use crate::error::{Result, RouteError};
use crate::types::EventEnvelope;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Delivery callback run for each dequeued event.
pub type EventHandler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

/// Hand-off point between the dispatcher and asynchronous delivery.
pub trait EventQueue: Send + Sync {
    /// Queue one event. `QueueFull` and `QueueStopped` are soft failures
    /// the dispatcher logs and drops.
    fn enqueue(&self, event: EventEnvelope) -> Result<()>;

    /// Count one event handed to the queue.
    fn register_incoming_event(&self);

    /// Count one event fully handled.
    fn register_processed_event(&self);

    /// Events currently waiting.
    fn queue_length(&self) -> usize;

    /// Events handed to the queue since construction.
    fn events_scheduled(&self) -> u64;

    /// Events fully handled since construction.
    fn events_processed(&self) -> u64;

    /// Queued occurrences per event name.
    fn per_event_statistics(&self) -> HashMap<String, u64>;

    /// Begin consuming with `handler`; anything queued beforehand is
    /// delivered first. Starting a running queue is a no-op.
    fn start(&self, handler: EventHandler) -> Result<()>;

    /// Stop consuming. Queued events are drained before the workers exit.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

enum QueueState {
    /// Not started yet; events wait here in arrival order.
    Buffering(Vec<EventEnvelope>),
    Running {
        sender: Sender<EventEnvelope>,
        workers: Vec<JoinHandle<()>>,
    },
    Stopped,
}

/// Crossbeam-backed [`EventQueue`]: a fixed-capacity channel consumed by a
/// small worker pool. A stopped queue can be started again.
pub struct ThreadedEventQueue {
    capacity: usize,
    workers: usize,
    state: Mutex<QueueState>,
    running: AtomicBool,
    scheduled: AtomicU64,
    processed: Arc<AtomicU64>,
    per_event: Mutex<HashMap<String, u64>>,
}

impl ThreadedEventQueue {
    /// Queue bounded to `capacity` events, consumed by `workers` threads
    /// (both forced to at least 1).
    pub fn new(capacity: usize, workers: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            workers: workers.max(1),
            state: Mutex::new(QueueState::Buffering(Vec::new())),
            running: AtomicBool::new(false),
            scheduled: AtomicU64::new(0),
            processed: Arc::new(AtomicU64::new(0)),
            per_event: Mutex::new(HashMap::new()),
        }
    }

    fn count_queued(&self, event_name: &str) {
        self.register_incoming_event();
        *self
            .per_event
            .lock()
            .entry(event_name.to_string())
            .or_insert(0) += 1;
    }
}

impl EventQueue for ThreadedEventQueue {
    fn enqueue(&self, event: EventEnvelope) -> Result<()> {
        let mut state = self.state.lock();
        match &mut *state {
            QueueState::Buffering(buffered) => {
                if buffered.len() >= self.capacity {
                    return Err(RouteError::QueueFull);
                }
                let name = event.event.clone();
                buffered.push(event);
                drop(state);
                self.count_queued(&name);
                Ok(())
            }
            QueueState::Running { sender, .. } => {
                let sender = sender.clone();
                drop(state);

                let name = event.event.clone();
                match sender.try_send(event) {
                    Ok(()) => {
                        self.count_queued(&name);
                        Ok(())
                    }
                    Err(TrySendError::Full(_)) => Err(RouteError::QueueFull),
                    Err(TrySendError::Disconnected(_)) => Err(RouteError::QueueStopped),
                }
            }
            QueueState::Stopped => Err(RouteError::QueueStopped),
        }
    }

    fn register_incoming_event(&self) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
    }

    fn register_processed_event(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn queue_length(&self) -> usize {
        match &*self.state.lock() {
            QueueState::Buffering(buffered) => buffered.len(),
            QueueState::Running { sender, .. } => sender.len(),
            QueueState::Stopped => 0,
        }
    }

    fn events_scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    fn events_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    fn per_event_statistics(&self) -> HashMap<String, u64> {
        self.per_event.lock().clone()
    }

    fn start(&self, handler: EventHandler) -> Result<()> {
        let mut state = self.state.lock();

        let backlog = match &mut *state {
            QueueState::Running { .. } => return Ok(()),
            QueueState::Buffering(buffered) => std::mem::take(buffered),
            QueueState::Stopped => Vec::new(),
        };

        let (sender, receiver) = bounded::<EventEnvelope>(self.capacity);

        // The backlog never exceeds capacity, so this cannot fail.
        for event in backlog {
            let _ = sender.try_send(event);
        }

        let mut workers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let processed = Arc::clone(&self.processed);
            workers.push(thread::spawn(move || {
                worker_loop(receiver, handler, processed);
            }));
        }

        *state = QueueState::Running { sender, workers };
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();

        match std::mem::replace(&mut *state, QueueState::Stopped) {
            QueueState::Running { sender, workers } => {
                // Disconnecting lets the workers drain the channel and exit.
                drop(sender);
                self.running.store(false, Ordering::SeqCst);
                drop(state);

                for worker in workers {
                    let _ = worker.join();
                }
            }
            QueueState::Buffering(buffered) => {
                self.running.store(false, Ordering::SeqCst);
                if !buffered.is_empty() {
                    tracing::debug!("discarding {} buffered event(s) on stop", buffered.len());
                }
            }
            QueueState::Stopped => {}
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn worker_loop(
    receiver: Receiver<EventEnvelope>,
    handler: EventHandler,
    processed: Arc<AtomicU64>,
) {
    while let Ok(event) = receiver.recv() {
        let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event)));
        if outcome.is_err() {
            tracing::warn!(
                "listener panicked handling '{}' on '{}'",
                event.event,
                event.path
            );
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
}
