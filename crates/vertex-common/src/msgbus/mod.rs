//! A topic-addressed publish/subscribe bus with optional per-topic retention (spec.md §4.1).
//!
//! Deliberately *not* a global singleton (spec.md §9 design note: "Treat each as a process-wide
//! context constructed at startup and passed explicitly into every node and engine"). Callers
//! hold an `Arc<MessageBus>` and pass it to every node/engine they construct; teardown is the
//! explicit `shutdown()` call.

mod error;
mod message;
mod retention;
mod subscription;

pub use error::BusError;
pub use message::BusMessage;
pub use retention::{RetentionRing, DEFAULT_RETENTION_CAPACITY};
pub use subscription::{Subscription, SubscriptionHandle, SubscriptionId};

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::trace;
use vertex_model::Topic;

use subscription::next_subscription_id;

/// Default bound of a subscriber's inbound queue (spec.md §4.1: "on the order of hundreds").
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

struct SubscriberEntry {
    id: SubscriptionId,
    sender: mpsc::Sender<BusMessage>,
    dropped: Arc<AtomicU64>,
}

#[derive(Default)]
struct Routes {
    subs: HashMap<Topic, Vec<SubscriberEntry>>,
    retention: HashMap<Topic, RetentionRing>,
}

/// The bus. Cheaply shareable: construct once, wrap in `Arc`, clone the `Arc` into every node
/// and engine that needs to publish or subscribe.
pub struct MessageBus {
    routes: RwLock<Routes>,
    closed: AtomicBool,
    subscriber_capacity: usize,
    retention_capacity: usize,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_RETENTION_CAPACITY)
    }
}

impl MessageBus {
    #[must_use]
    pub fn new(subscriber_capacity: usize, retention_capacity: usize) -> Self {
        Self {
            routes: RwLock::new(Routes::default()),
            closed: AtomicBool::new(false),
            subscriber_capacity,
            retention_capacity,
        }
    }

    /// Publishes `payload` to every current subscriber of `topic` and, if the topic has a
    /// retention ring (lazily created on first publish or first subscribe-with-retention),
    /// appends it there too. Never blocks on a slow subscriber: a full inbound queue means the
    /// message is dropped for that subscriber only (spec.md §4.1).
    pub fn publish(&self, topic: Topic, payload: Bytes) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut routes = self.routes.write().expect("msgbus routes lock poisoned");
        let stream_id = routes.retention.get_mut(&topic).map(|ring| ring.push(payload.clone()));

        let Some(subs) = routes.subs.get(&topic) else {
            trace!(%topic, "publish with no subscribers");
            return;
        };
        for sub in subs {
            let msg = BusMessage { topic, payload: payload.clone(), stream_id };
            if sub.sender.try_send(msg).is_err() {
                sub.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Convenience for publishing a `Serialize` value as JSON.
    pub fn publish_json<T: Serialize>(&self, topic: Topic, value: &T) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.publish(topic, Bytes::from(bytes)),
            Err(err) => tracing::error!(%topic, %err, "failed to serialize bus payload"),
        }
    }

    /// Ensures `topic` has a retention ring, creating one with the bus's default capacity if
    /// absent. Idempotent.
    pub fn enable_retention(&self, topic: Topic) {
        let mut routes = self.routes.write().expect("msgbus routes lock poisoned");
        routes.retention.entry(topic).or_insert_with(|| RetentionRing::new(self.retention_capacity));
    }

    /// Registers a new subscriber for `topic`. If `from_stream_id` is given and the topic has
    /// retention, the retained tail `[from_stream_id, ..]` is queued onto the subscriber's
    /// channel *before* the subscriber is registered for live delivery — both steps happen under
    /// one write-lock acquisition, so no publish can land between replay and live registration
    /// (spec.md §8: "no duplicate at the boundary").
    pub fn subscribe(self: &Arc<Self>, topic: Topic, from_stream_id: Option<u64>) -> Result<Subscription, BusError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BusError::BusShutDown);
        }
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        let id = next_subscription_id();
        let dropped = Arc::new(AtomicU64::new(0));

        let mut routes = self.routes.write().expect("msgbus routes lock poisoned");
        if let Some(from_id) = from_stream_id {
            if let Some(ring) = routes.retention.get(&topic) {
                for (stream_id, payload) in ring.from(from_id) {
                    let _ = tx.try_send(BusMessage { topic, payload, stream_id: Some(stream_id) });
                }
            }
        }
        routes.subs.entry(topic).or_default().push(SubscriberEntry { id, sender: tx, dropped: dropped.clone() });

        Ok(Subscription { handle: SubscriptionHandle { topic, id }, receiver: rx, dropped, bus: Arc::downgrade(self) })
    }

    /// Removes a subscriber. In-flight deliveries already queued may still be drained by the
    /// holder of the [`Subscription`]; no new message will be routed to it (spec.md §4.1).
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut routes = self.routes.write().expect("msgbus routes lock poisoned");
        if let Some(subs) = routes.subs.get_mut(&handle.topic) {
            subs.retain(|s| s.id != handle.id);
            if subs.is_empty() {
                let has_retention = routes.retention.get(&handle.topic).is_some_and(|r| !r.is_empty());
                if !has_retention {
                    routes.subs.remove(&handle.topic);
                }
            }
        }
    }

    /// Snapshot of topic names currently with either a subscriber or a non-empty retention
    /// stream (spec.md §4.1).
    #[must_use]
    pub fn list_topics(&self) -> Vec<Topic> {
        let routes = self.routes.read().expect("msgbus routes lock poisoned");
        let mut topics: Vec<Topic> = routes
            .subs
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(t, _)| *t)
            .chain(routes.retention.iter().filter(|(_, r)| !r.is_empty()).map(|(t, _)| *t))
            .collect();
        topics.sort_by_key(|t| t.0);
        topics.dedup();
        topics
    }

    #[must_use]
    pub fn stream_len(&self, topic: Topic) -> usize {
        let routes = self.routes.read().expect("msgbus routes lock poisoned");
        routes.retention.get(&topic).map_or(0, RetentionRing::len)
    }

    #[must_use]
    pub fn stream_tail(&self, topic: Topic, n: usize) -> Vec<(u64, Bytes)> {
        let routes = self.routes.read().expect("msgbus routes lock poisoned");
        routes.retention.get(&topic).map(|r| r.tail(n)).unwrap_or_default()
    }

    #[must_use]
    pub fn stream_range(&self, topic: Topic, from: u64, to: u64) -> Vec<(u64, Bytes)> {
        let routes = self.routes.read().expect("msgbus routes lock poisoned");
        routes.retention.get(&topic).map(|r| r.range(from, to)).unwrap_or_default()
    }

    /// Tears the bus down: no further `subscribe` calls will succeed. Existing subscribers are
    /// cleared so in-flight `publish` calls become no-ops against them.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut routes = self.routes.write().expect("msgbus routes lock poisoned");
        routes.subs.clear();
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests;
