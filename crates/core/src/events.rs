//! Synchronous in-process event bus.

use dashmap::DashMap;
use sling_resolver_api::{Event, EventAdmin, EventFilter, EventHandler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

struct Subscriber {
    filter: Arc<dyn EventFilter>,
    handler: Arc<dyn EventHandler>,
}

/// Delivers each posted event on the posting thread to every subscriber
/// whose filter accepts it.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(
        self: &Arc<Self>,
        filter: Arc<dyn EventFilter>,
        handler: Arc<dyn EventHandler>,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, Subscriber { filter, handler });
        debug!("Registered event subscriber {}", id);
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl EventAdmin for EventBus {
    fn post_event(&self, event: Event) {
        // handlers may post in turn, so no shard lock is held while delivering
        let targets: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .iter()
            .filter(|s| s.filter.matches(&event))
            .map(|s| Arc::clone(&s.handler))
            .collect();
        debug!("Delivering {} to {} subscriber(s)", event.topic, targets.len());
        for handler in targets {
            handler.handle_event(&event);
        }
    }
}

/// Handle of one subscription; dropping it keeps the subscription alive.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Event admin that drops everything.
pub struct NoopEventAdmin;

impl EventAdmin for NoopEventAdmin {
    fn post_event(&self, _event: Event) {}
}
