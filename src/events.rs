// Event bus - typed publish/subscribe used to keep derived indices in sync
// with the truth store (spec 4.2). Delivery is synchronous, ordered, and
// runs in the publishing thread, mirroring the teacher's tagged-`Operation`
// enum (observability.rs) but for domain events rather than trace logging.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::model::{Entity, Relation};

/// A domain event emitted by the storage layer after a successful mutation.
#[derive(Debug, Clone)]
pub enum Event {
    EntityCreated { entity: Entity },
    EntityUpdated { entity: Entity },
    EntityDeleted { name: String },
    RelationCreated { relation: Relation },
    RelationDeleted { from: String, to: String, relation_type: String },
    ObservationAdded { name: String, observation: String },
    ObservationDeleted { name: String, observation: String },
    GraphSaved,
    GraphLoaded,
}

/// A subscriber handler. Per spec 4.2, handlers must not mutate the store
/// from within the callback (re-entrancy); anything that needs to mutate
/// should enqueue work for later instead.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        self(event)
    }
}

/// Synchronous, ordered, in-thread publish/subscribe bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.subscribers.write().push(handler);
    }

    /// Deliver `event` to every subscriber, in subscription order. A
    /// handler panic is caught, logged, and swallowed so the rest of the
    /// chain still runs (spec 4.2: "handler exception is logged and
    /// swallowed").
    pub fn publish(&self, event: Event) {
        let subscribers = self.subscribers.read().clone();
        for handler in subscribers.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| handler.handle(&event)));
            if let Err(panic) = result {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("event subscriber panicked: {msg}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_events_in_order_to_all_subscribers() {
        let bus = EventBus::new();
        let calls = Arc::new(RwLock::new(Vec::new()));

        let calls1 = calls.clone();
        bus.subscribe(Arc::new(move |e: &Event| {
            calls1.write().push(format!("{e:?}"));
        }));

        bus.publish(Event::GraphLoaded);
        bus.publish(Event::GraphSaved);

        let log = calls.read();
        assert_eq!(log.len(), 2);
        assert!(log[0].contains("GraphLoaded"));
        assert!(log[1].contains("GraphSaved"));
    }

    #[test]
    fn a_panicking_subscriber_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(Arc::new(|_: &Event| panic!("boom")));
        let count2 = count.clone();
        bus.subscribe(Arc::new(move |_: &Event| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));

        bus.publish(Event::GraphSaved);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
