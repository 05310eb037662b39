//! A live subscription: the receiving half of a subscriber's inbound queue.

use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::mpsc;
use vertex_model::Topic;

use super::message::BusMessage;
use super::MessageBus;

/// Globally unique id for one `subscribe` call, used to remove the right entry from the bus's
/// per-topic subscriber list on drop or explicit `unsubscribe`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SubscriptionId(pub(super) u64);

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

pub(super) fn next_subscription_id() -> SubscriptionId {
    SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// An identifying handle a caller keeps around to later call `unsubscribe` explicitly, separate
/// from the [`Subscription`] stream itself (which also unsubscribes on `Drop`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SubscriptionHandle {
    pub topic: Topic,
    pub id: SubscriptionId,
}

/// The live, pollable half of a subscription. Implements [`Stream`] so a node's main loop can
/// `while let Some(msg) = subscription.next().await`. Drives delivery order: messages for this
/// subscriber arrive in the exact order `publish` was called (spec.md §4.1, §5, §8).
pub struct Subscription {
    pub(super) handle: SubscriptionHandle,
    pub(super) receiver: mpsc::Receiver<BusMessage>,
    pub(super) dropped: Arc<AtomicU64>,
    pub(super) bus: Weak<MessageBus>,
}

impl Subscription {
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Count of messages dropped for this subscriber due to a full inbound queue (spec.md §4.1:
    /// "Policy when full: drop-newest with a counter that is observable via stats").
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.handle);
        }
    }
}
