//! Event fan-out hub for SSE delivery.
//!
//! Maps an entity id (member id or project id, depending on the hub
//! instance) to the set of subscriber queues currently streaming that
//! entity. Delivery is at-most-once per enqueued payload per connected
//! subscriber: no replay for late subscribers, FIFO within one queue, and
//! publishing with zero subscribers is a cheap no-op so mutating operations
//! never need to know whether anyone is listening.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

struct Subscriber {
    id: Uuid,
    queue: mpsc::UnboundedSender<String>,
}

/// One client's live subscription: the handle used for disconnect plus the
/// receiving end of its delivery queue.
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::UnboundedReceiver<String>,
}

/// Process-wide subscriber table for one entity kind.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<DashMap<String, Vec<Subscriber>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
        }
    }

    /// Add a new delivery queue for `entity_id` and return its subscription.
    pub fn connect(&self, entity_id: &str) -> Subscription {
        let (queue, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers
            .entry(entity_id.to_string())
            .or_default()
            .push(Subscriber { id, queue });

        tracing::debug!(entity_id = %entity_id, subscriber = %id, "event subscriber connected");
        Subscription { id, receiver }
    }

    /// Remove one subscriber; the entity entry itself is removed once its
    /// subscriber set becomes empty.
    pub fn disconnect(&self, entity_id: &str, id: Uuid) {
        let mut prune = false;
        if let Some(mut entry) = self.subscribers.get_mut(entity_id) {
            entry.retain(|s| s.id != id);
            prune = entry.is_empty();
        }
        if prune {
            self.subscribers.remove_if(entity_id, |_, subs| subs.is_empty());
        }
        tracing::debug!(entity_id = %entity_id, subscriber = %id, "event subscriber disconnected");
    }

    /// Enqueue a serialized payload onto every current subscriber queue for
    /// `entity_id`. With no subscribers this does nothing and retains
    /// nothing.
    pub fn send_event(&self, entity_id: &str, payload: &str) {
        if let Some(entry) = self.subscribers.get(entity_id) {
            for subscriber in entry.iter() {
                if subscriber.queue.send(payload.to_string()).is_err() {
                    tracing::debug!(
                        entity_id = %entity_id,
                        subscriber = %subscriber.id,
                        "subscriber queue closed, event dropped"
                    );
                }
            }
        }
    }

    /// Number of live subscribers for an entity (used by tests and metrics
    /// logging).
    pub fn subscriber_count(&self, entity_id: &str) -> usize {
        self.subscribers
            .get(entity_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}
