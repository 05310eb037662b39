//! The cooperative node runtime shared by every consumer/producer of bus messages: ingestion,
//! indicator, strategy and gateway nodes all drive their message loop through a
//! [`NodeRuntime`] (spec.md §4.2).

mod state;

pub use state::NodeState;

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SelectAll, StreamExt};
use tokio::{sync::watch, task::JoinHandle, time::Duration};
use tracing::{error, info, warn};
use vertex_core::VertexError;
use vertex_model::Topic;

use crate::msgbus::{BusMessage, MessageBus, Subscription};

/// Default consecutive-error threshold before a node stops itself and escalates to its
/// supervisor (spec.md §4.2).
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Default drain timeout observed by `stop()` (spec.md §4.2: "drains in-flight handlers up to a
/// timeout").
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The single cooperative entry point a node implements (spec.md §4.2). `process` must not
/// block on external I/O without its own timeout; the runtime does not enforce this, it is a
/// contract on implementers.
#[async_trait]
pub trait NodeHandler: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn process(&self, topic: Topic, payload: &[u8]) -> Result<(), VertexError>;
}

/// Drives one [`NodeHandler`] against a fixed set of topic subscriptions, tracking lifecycle
/// state and consecutive handler errors. Construct with [`NodeRuntime::new`], wrap in `Arc`,
/// then call [`NodeRuntime::start`].
pub struct NodeRuntime<H: NodeHandler> {
    bus: Arc<MessageBus>,
    handler: Arc<H>,
    topics: Vec<Topic>,
    state_tx: watch::Sender<NodeState>,
    state_rx: watch::Receiver<NodeState>,
    consecutive_errors: AtomicU32,
    max_consecutive_errors: u32,
    join: Mutex<Option<JoinHandle<()>>>,
    stop_timeout: Duration,
}

impl<H: NodeHandler> NodeRuntime<H> {
    #[must_use]
    pub fn new(bus: Arc<MessageBus>, handler: H, topics: Vec<Topic>) -> Self {
        let (state_tx, state_rx) = watch::channel(NodeState::New);
        Self {
            bus,
            handler: Arc::new(handler),
            topics,
            state_tx,
            state_rx,
            consecutive_errors: AtomicU32::new(0),
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            join: Mutex::new(None),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_consecutive_errors(mut self, n: u32) -> Self {
        self.max_consecutive_errors = n;
        self
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<NodeState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Transitions `new -> running`: opens every declared subscription and spawns the worker
    /// that feeds incoming messages to [`NodeHandler::process`] in subscribe order. A node may
    /// only be started once (spec.md §4.2) — calling `start` twice on an already-running node
    /// is a programming error and panics, matching the teacher's convention of panicking on
    /// misuse of single-shot lifecycle APIs rather than returning a swallowable error.
    pub async fn start(self: &Arc<Self>) {
        assert_eq!(self.state(), NodeState::New, "node '{}' already started", self.name());

        let mut subs: Vec<Subscription> = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            match self.bus.subscribe(*topic, None) {
                Ok(sub) => subs.push(sub),
                Err(err) => {
                    error!(node = self.name(), %topic, %err, "failed to subscribe");
                }
            }
        }

        let _ = self.state_tx.send(NodeState::Running);
        info!(node = self.name(), topics = subs.len(), "node started");

        let this = Arc::clone(self);
        let join = tokio::spawn(async move { this.run(subs).await });
        *self.join.lock().expect("node join lock poisoned") = Some(join);
    }

    async fn run(self: Arc<Self>, subs: Vec<Subscription>) {
        let mut merged: SelectAll<Subscription> = futures::stream::select_all(subs);
        while let Some(msg) = merged.next().await {
            if self.state() != NodeState::Running {
                break;
            }
            self.dispatch(msg).await;
        }
        let _ = self.state_tx.send(NodeState::Stopped);
        info!(node = self.name(), "node worker exited");
    }

    async fn dispatch(&self, msg: BusMessage) {
        match self.handler.process(msg.topic, &msg.payload).await {
            Ok(()) => {
                self.consecutive_errors.store(0, Ordering::Relaxed);
            }
            Err(err) => {
                let count = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(node = self.name(), %err, consecutive = count, "handler error");
                if count >= self.max_consecutive_errors {
                    error!(node = self.name(), "consecutive error threshold exceeded, stopping node");
                    let _ = self.state_tx.send(NodeState::Stopping);
                    self.emit_status(false, "consecutive error threshold exceeded");
                }
            }
        }
    }

    fn emit_status(&self, healthy: bool, reason: &str) {
        let payload = serde_json::json!({ "node": self.name(), "healthy": healthy, "reason": reason });
        if let Ok(bytes) = serde_json::to_vec(&payload) {
            self.bus.publish(Topic::status(self.name()), Bytes::from(bytes));
        }
    }

    /// Transitions `running -> stopping -> stopped`: stops accepting new work (the worker loop
    /// observes the state flip and exits after its current message), then waits up to
    /// `stop_timeout` for the worker to drain before declaring it stopped regardless (spec.md
    /// §4.2). Dropping the held [`Subscription`]s (inside the worker task) unsubscribes them
    /// from the bus automatically.
    pub async fn stop(&self) {
        if self.state() == NodeState::Stopped {
            return;
        }
        let _ = self.state_tx.send(NodeState::Stopping);

        let join = self.join.lock().expect("node join lock poisoned").take();
        if let Some(join) = join {
            if tokio::time::timeout(self.stop_timeout, join).await.is_err() {
                warn!(node = self.name(), "stop timed out waiting for worker to drain");
            }
        }
        let _ = self.state_tx.send(NodeState::Stopped);
    }

    /// Convenience for `bus.publish` from within a handler (spec.md §4.2).
    pub fn emit(&self, topic: Topic, payload: Bytes) {
        self.bus.publish(topic, payload);
    }

    pub fn emit_json<T: serde::Serialize>(&self, topic: Topic, value: &T) {
        self.bus.publish_json(topic, value);
    }
}
