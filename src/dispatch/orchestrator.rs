//! Decides, per fired event, between inline delivery and the queue.

use crate::dispatch::queue::{EventHandler, EventQueue};
use crate::error::{Result, RouteError};
use crate::namespace::NodeRef;
use crate::registry::ListenerRegistry;
use crate::types::{
    ConcurrencyMode, DispatchStats, EventData, EventEnvelope, EventId, Timestamp,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Entry point for fired events.
///
/// Synchronous events (by declaration or because the whole orchestrator runs
/// synchronously) are delivered on the firing thread. Everything else goes
/// through the [`EventQueue`], except events that provably have no listener
/// willing to take them, which are counted as processed and never queued.
pub struct DispatchOrchestrator {
    registry: Arc<ListenerRegistry>,
    queue: Arc<dyn EventQueue>,
    synchronous: bool,
    next_event_id: AtomicU64,
}

impl DispatchOrchestrator {
    pub fn new(
        registry: Arc<ListenerRegistry>,
        queue: Arc<dyn EventQueue>,
        synchronous: bool,
    ) -> Self {
        Self {
            registry,
            queue,
            synchronous,
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Fire `event_name` on `node`, with `data` as the payload.
    ///
    /// A full or stopped queue drops the event after logging it; the event
    /// id is returned either way. Firing an event the context never declared
    /// fails with `UnknownEvent`.
    pub fn fire(&self, node: &NodeRef, event_name: &str, data: EventData) -> Result<EventId> {
        let definition = node
            .event(event_name)
            .ok_or_else(|| RouteError::UnknownEvent {
                path: node.path().to_string(),
                event: event_name.to_string(),
            })?;

        let id = EventId(self.next_event_id.fetch_add(1, Ordering::Relaxed));
        let envelope = EventEnvelope {
            id,
            path: node.path().to_string(),
            event: event_name.to_string(),
            data,
            timestamp: Timestamp::now(),
        };

        if self.synchronous || definition.concurrency == ConcurrencyMode::Synchronous {
            deliver_bound(&self.registry, &envelope);
            self.queue.register_processed_event();
            return Ok(id);
        }

        // Before startup everything is queued; afterwards, events nobody
        // will take are settled here instead of travelling the queue.
        if self.queue.is_running()
            && !self
                .registry
                .has_live_listener(&envelope.path, &envelope.event, &envelope)
        {
            self.queue.register_processed_event();
            return Ok(id);
        }

        let path = envelope.path.clone();
        match self.queue.enqueue(envelope) {
            Ok(()) => Ok(id),
            Err(RouteError::QueueFull) => {
                tracing::debug!("queue full, dropping '{}' on '{}'", event_name, path);
                Ok(id)
            }
            Err(RouteError::QueueStopped) => {
                tracing::debug!("queue stopped, dropping '{}' on '{}'", event_name, path);
                Ok(id)
            }
            Err(other) => Err(other),
        }
    }

    /// Start queue consumption; queued pre-start events flow first.
    pub fn start(&self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let handler: EventHandler = Arc::new(move |event: &EventEnvelope| {
            deliver_bound(&registry, event);
        });
        self.queue.start(handler)
    }

    /// Stop queue consumption after draining it.
    pub fn stop(&self) {
        self.queue.stop();
    }

    pub fn is_running(&self) -> bool {
        self.queue.is_running()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            events_scheduled: self.queue.events_scheduled(),
            events_processed: self.queue.events_processed(),
            queue_length: self.queue.queue_length(),
            per_event_queued: self.queue.per_event_statistics(),
        }
    }
}

/// Deliver `envelope` to its bound listeners, in registration order.
fn deliver_bound(registry: &ListenerRegistry, envelope: &EventEnvelope) {
    for subscription in registry.bound_listeners(&envelope.path, &envelope.event) {
        if let Some(listener) = subscription.listener() {
            if listener.should_handle(envelope) {
                listener.on_event(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{ContextTree, MaskExpander, Namespace};
    use crate::paths::PathAlgebra;
    use crate::registry::EventListener;
    use crate::types::EventDefinition;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    enum EnqueueOutcome {
        Accept,
        Full,
        Stopped,
    }

    /// In-memory queue double that records what the orchestrator hands it.
    struct RecordingQueue {
        outcome: EnqueueOutcome,
        running: AtomicBool,
        enqueued: Mutex<Vec<EventEnvelope>>,
        scheduled: AtomicU64,
        processed: AtomicU64,
    }

    impl RecordingQueue {
        fn with_outcome(outcome: EnqueueOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                running: AtomicBool::new(false),
                enqueued: Mutex::new(Vec::new()),
                scheduled: AtomicU64::new(0),
                processed: AtomicU64::new(0),
            })
        }

        fn accepting() -> Arc<Self> {
            Self::with_outcome(EnqueueOutcome::Accept)
        }

        fn enqueued_events(&self) -> Vec<String> {
            self.enqueued
                .lock()
                .iter()
                .map(|envelope| envelope.event.clone())
                .collect()
        }
    }

    impl EventQueue for RecordingQueue {
        fn enqueue(&self, event: EventEnvelope) -> Result<()> {
            match self.outcome {
                EnqueueOutcome::Accept => {
                    self.register_incoming_event();
                    self.enqueued.lock().push(event);
                    Ok(())
                }
                EnqueueOutcome::Full => Err(RouteError::QueueFull),
                EnqueueOutcome::Stopped => Err(RouteError::QueueStopped),
            }
        }

        fn register_incoming_event(&self) {
            self.scheduled.fetch_add(1, Ordering::SeqCst);
        }

        fn register_processed_event(&self) {
            self.processed.fetch_add(1, Ordering::SeqCst);
        }

        fn queue_length(&self) -> usize {
            self.enqueued.lock().len()
        }

        fn events_scheduled(&self) -> u64 {
            self.scheduled.load(Ordering::SeqCst)
        }

        fn events_processed(&self) -> u64 {
            self.processed.load(Ordering::SeqCst)
        }

        fn per_event_statistics(&self) -> HashMap<String, u64> {
            HashMap::new()
        }

        fn start(&self, _handler: EventHandler) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    /// Listener that records the events it receives.
    struct Recorder {
        received: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: Mutex::new(Vec::new()),
            })
        }

        fn received(&self) -> Vec<String> {
            self.received.lock().clone()
        }
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &EventEnvelope) {
            self.received.lock().push(event.event.clone());
        }
    }

    struct Rejecting;

    impl EventListener for Rejecting {
        fn should_handle(&self, _event: &EventEnvelope) -> bool {
            false
        }

        fn on_event(&self, _event: &EventEnvelope) {
            panic!("filtered listener must not receive events");
        }
    }

    struct Fixture {
        tree: Arc<ContextTree>,
        registry: Arc<ListenerRegistry>,
    }

    fn fixture() -> Fixture {
        let algebra = Arc::new(PathAlgebra::default());
        let tree = Arc::new(ContextTree::new(Arc::clone(&algebra)));
        let namespace: Arc<dyn Namespace> = tree.clone();
        let expander = Arc::new(MaskExpander::new(
            Arc::clone(&namespace),
            Arc::clone(&algebra),
        ));
        let registry = Arc::new(ListenerRegistry::new(algebra, namespace, expander));
        Fixture { tree, registry }
    }

    fn add_context(fx: &Fixture, path: &str, events: &[EventDefinition]) -> NodeRef {
        let node = fx.tree.insert(path, "context").unwrap();
        for definition in events {
            fx.tree.declare_event(path, definition.clone()).unwrap();
        }
        fx.registry.on_node_added(&node);
        node
    }

    fn orchestrator(
        fx: &Fixture,
        queue: Arc<RecordingQueue>,
        synchronous: bool,
    ) -> DispatchOrchestrator {
        DispatchOrchestrator::new(Arc::clone(&fx.registry), queue, synchronous)
    }

    // --- Inline delivery ---

    #[test]
    fn test_synchronous_event_is_delivered_inline() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::synchronous("opened")]);

        let recorder = Recorder::new();
        let listener: Arc<dyn EventListener> = recorder.clone();
        fx.registry.subscribe("door", "opened", listener);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert_eq!(recorder.received(), vec!["opened"]);
        assert!(queue.enqueued_events().is_empty());
        assert_eq!(queue.events_processed(), 1);
    }

    #[test]
    fn test_synchronous_mode_forces_inline_delivery() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let recorder = Recorder::new();
        let listener: Arc<dyn EventListener> = recorder.clone();
        fx.registry.subscribe("door", "opened", listener);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), true);

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert_eq!(recorder.received(), vec!["opened"]);
        assert!(queue.enqueued_events().is_empty());
    }

    #[test]
    fn test_inline_delivery_respects_filter() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::synchronous("opened")]);

        let listener: Arc<dyn EventListener> = Arc::new(Rejecting);
        fx.registry.subscribe("door", "opened", listener);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        // Rejecting::on_event panics, so reaching it would fail the test.
        dispatch.fire(&node, "opened", EventData::empty()).unwrap();
        assert_eq!(queue.events_processed(), 1);
    }

    // --- Queued delivery ---

    #[test]
    fn test_queued_event_reaches_queue_when_listener_is_bound() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let recorder = Recorder::new();
        let listener: Arc<dyn EventListener> = recorder.clone();
        fx.registry.subscribe("door", "opened", listener);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);
        dispatch.start().unwrap();

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert_eq!(queue.enqueued_events(), vec!["opened"]);
        assert_eq!(queue.events_scheduled(), 1);
        // Delivery belongs to the queue; the recorder sees nothing here.
        assert!(recorder.received().is_empty());
    }

    #[test]
    fn test_zero_listeners_short_circuits_once_running() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);
        dispatch.start().unwrap();

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert!(queue.enqueued_events().is_empty());
        assert_eq!(queue.events_processed(), 1);
        assert_eq!(queue.events_scheduled(), 0);
    }

    #[test]
    fn test_filtered_out_listener_short_circuits() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let listener: Arc<dyn EventListener> = Arc::new(Rejecting);
        fx.registry.subscribe("door", "opened", listener);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);
        dispatch.start().unwrap();

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert!(queue.enqueued_events().is_empty());
        assert_eq!(queue.events_processed(), 1);
    }

    #[test]
    fn test_events_before_start_are_queued_not_dropped() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        // No listeners and not running: the short circuit must not apply.
        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        assert_eq!(queue.enqueued_events(), vec!["opened"]);
        assert_eq!(queue.events_processed(), 0);
    }

    // --- Failure handling ---

    #[test]
    fn test_full_queue_drops_event_without_error() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::with_outcome(EnqueueOutcome::Full);
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        let result = dispatch.fire(&node, "opened", EventData::empty());
        assert!(result.is_ok());
    }

    #[test]
    fn test_stopped_queue_drops_event_without_error() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::with_outcome(EnqueueOutcome::Stopped);
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        let result = dispatch.fire(&node, "opened", EventData::empty());
        assert!(result.is_ok());
    }

    #[test]
    fn test_undeclared_event_is_rejected() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        let result = dispatch.fire(&node, "slammed", EventData::empty());
        assert!(matches!(result, Err(RouteError::UnknownEvent { .. })));
        assert!(queue.enqueued_events().is_empty());
    }

    // --- Bookkeeping ---

    #[test]
    fn test_event_ids_are_unique_and_increasing() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        let first = dispatch.fire(&node, "opened", EventData::empty()).unwrap();
        let second = dispatch.fire(&node, "opened", EventData::empty()).unwrap();
        assert!(second.0 > first.0);
    }

    #[test]
    fn test_stats_reflect_queue_counters() {
        let fx = fixture();
        let node = add_context(&fx, "door", &[EventDefinition::new("opened")]);

        let queue = RecordingQueue::accepting();
        let dispatch = orchestrator(&fx, Arc::clone(&queue), false);

        dispatch.fire(&node, "opened", EventData::empty()).unwrap();
        dispatch.fire(&node, "opened", EventData::empty()).unwrap();

        let stats = dispatch.stats();
        assert_eq!(stats.events_scheduled, 2);
        assert_eq!(stats.queue_length, 2);
        assert_eq!(stats.events_processed, 0);
    }
}
