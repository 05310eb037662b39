//! Maintains a continuous, gap-free bar series for a configured set of series keys (spec.md
//! §4.4). Unlike [`vertex_common::node::NodeRuntime`], which drives a handler reactively off bus
//! subscriptions, an ingestion node is a *producer*: its own background loop pulls from an
//! external exchange and pushes onto the bus, so it gets its own small lifecycle/backoff driver
//! here rather than reusing `NodeRuntime` (grounded on the same `watch`-channel state pattern,
//! generalized to a polling rather than a subscribe-and-dispatch loop).

mod adapter;
mod backoff;
mod gapfill;

pub use adapter::{ExchangeAdapter, LiveBarEvent};
pub use backoff::Backoff;

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{error, info, warn};
use vertex_common::{MessageBus, NodeState};
use vertex_core::Clock;
use vertex_model::{SeriesKey, Topic};
use vertex_persistence::BarStore;

/// How far back an ingestion node backfills on startup (spec.md §4.4).
pub const DEFAULT_BACKFILL_WINDOW_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Clone, Copy, Debug)]
pub struct IngestionConfig {
    pub backfill_window_secs: i64,
    pub max_retries: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            backfill_window_secs: DEFAULT_BACKFILL_WINDOW_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Drives backfill-then-live ingestion for a fixed set of series keys against one
/// [`ExchangeAdapter`].
pub struct IngestionNode {
    name: String,
    bus: Arc<MessageBus>,
    store: Arc<dyn BarStore>,
    adapter: Arc<dyn ExchangeAdapter>,
    clock: Arc<dyn Clock>,
    keys: Vec<SeriesKey>,
    config: IngestionConfig,
    state_tx: watch::Sender<NodeState>,
    state_rx: watch::Receiver<NodeState>,
    consecutive_failures: AtomicU32,
}

impl IngestionNode {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        bus: Arc<MessageBus>,
        store: Arc<dyn BarStore>,
        adapter: Arc<dyn ExchangeAdapter>,
        clock: Arc<dyn Clock>,
        keys: Vec<SeriesKey>,
        config: IngestionConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(NodeState::New);
        Self {
            name: name.into(),
            bus,
            store,
            adapter,
            clock,
            keys,
            config,
            state_tx,
            state_rx,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<NodeState> {
        self.state_rx.clone()
    }

    /// Backfills every tracked key, then consumes the adapter's live stream until it ends or the
    /// node is asked to stop, reconnecting with backoff and re-running gap-fill over the outage
    /// window each time the stream drops (spec.md §4.4).
    pub async fn run(self: Arc<Self>) {
        let _ = self.state_tx.send(NodeState::Running);
        info!(node = %self.name, keys = self.keys.len(), "ingestion node starting backfill");

        for key in self.keys.clone() {
            if let Err(err) = gapfill::backfill(self.as_ref(), key).await {
                warn!(node = %self.name, %key, %err, "initial backfill failed");
            }
        }

        let mut backoff = Backoff::default();
        while self.state() == NodeState::Running {
            self.stream_live().await;
            if self.state() != NodeState::Running {
                break;
            }

            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(node = %self.name, failures, "live stream disconnected, reconnecting");
            if failures >= self.config.max_retries {
                self.emit_status(false, "exceeded max reconnect retries, running degraded");
            }
            tokio::time::sleep(backoff.next_delay()).await;
            for key in self.keys.clone() {
                if let Err(err) = gapfill::backfill(self.as_ref(), key).await {
                    warn!(node = %self.name, %key, %err, "post-reconnect gap-fill failed");
                }
            }
        }
        let _ = self.state_tx.send(NodeState::Stopped);
    }

    /// Consumes the adapter's live stream until it ends (disconnect) or the node is stopped.
    async fn stream_live(&self) {
        let mut stream = self.adapter.live_bars(self.keys.clone()).await;
        while let Some(event) = stream.next().await {
            if self.state() != NodeState::Running {
                break;
            }
            match event {
                LiveBarEvent::Closed(bar) => {
                    self.consecutive_failures.store(0, Ordering::Relaxed);
                    if let Err(err) = self.store.persist(bar).await {
                        error!(node = %self.name, %err, "failed to persist closed bar");
                        continue;
                    }
                    self.bus.publish_json(Topic::bar(bar.key()), &bar);
                }
                LiveBarEvent::Partial(bar) => {
                    self.bus.publish_json(Topic::bar_tick(bar.key()), &bar);
                }
            }
        }
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn store(&self) -> &dyn BarStore {
        self.store.as_ref()
    }

    pub(crate) fn adapter(&self) -> &dyn ExchangeAdapter {
        self.adapter.as_ref()
    }

    pub(crate) fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub(crate) fn config(&self) -> IngestionConfig {
        self.config
    }

    fn emit_status(&self, healthy: bool, reason: &str) {
        let payload = serde_json::json!({ "node": self.name, "healthy": healthy, "reason": reason });
        self.bus.publish_json(Topic::status(&self.name), &payload);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use vertex_core::{LiveClock, UnixSeconds};
    use vertex_model::{MarketKind, Timeframe};
    use vertex_persistence::InMemoryStore;

    use super::*;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            symbol: "ETHUSDT".into(),
            timeframe: Timeframe::Minute1,
            market_kind: MarketKind::Spot,
            timestamp: UnixSeconds(ts),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    /// Serves a fixed set of historical bars on `fetch_range` and one pre-scripted batch of
    /// live events, then ends its live stream (simulating a disconnect).
    struct ScriptedAdapter {
        history: Vec<Bar>,
        live: StdMutex<Vec<LiveBarEvent>>,
    }

    #[async_trait]
    impl ExchangeAdapter for ScriptedAdapter {
        async fn fetch_range(&self, _key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Bar>, VertexError> {
            Ok(self.history.iter().filter(|b| b.timestamp.0 >= from.0 && b.timestamp.0 <= to.0).copied().collect())
        }

        async fn live_bars(&self, _keys: Vec<SeriesKey>) -> BoxStream<'static, LiveBarEvent> {
            let events = std::mem::take(&mut *self.live.lock().expect("live script lock poisoned"));
            Box::pin(futures::stream::iter(events))
        }
    }

    #[tokio::test]
    async fn backfill_persists_and_publishes_missing_history_ascending() {
        let bus = Arc::new(MessageBus::default());
        let store: Arc<dyn BarStore> = Arc::new(InMemoryStore::new());
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let adapter = Arc::new(ScriptedAdapter {
            history: vec![bar(0, 100.0), bar(60, 101.0), bar(120, 102.0)],
            live: StdMutex::new(vec![]),
        });
        let clock = Arc::new(vertex_core::TestClock::new(UnixSeconds(120)));
        let mut sub = bus.subscribe(Topic::bar(key), None).unwrap();

        let node = Arc::new(IngestionNode::new(
            "ingest-eth",
            bus,
            store.clone(),
            adapter,
            clock,
            vec![key],
            IngestionConfig { backfill_window_secs: 3600, max_retries: 5 },
        ));
        gapfill::backfill(&node, key).await.unwrap();

        let persisted = store.range(key, UnixSeconds(0), UnixSeconds(120)).await.unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[0].timestamp.0, 0);

        for expected in [0, 60, 120] {
            let msg = sub.recv().await.unwrap();
            let published: Bar = serde_json::from_slice(&msg.payload).unwrap();
            assert_eq!(published.timestamp.0, expected);
        }
    }

    #[tokio::test]
    async fn live_closed_bars_are_persisted_and_partial_bars_are_not() {
        let bus = Arc::new(MessageBus::default());
        let store: Arc<dyn BarStore> = Arc::new(InMemoryStore::new());
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let adapter = Arc::new(ScriptedAdapter {
            history: vec![],
            live: StdMutex::new(vec![LiveBarEvent::Closed(bar(180, 103.0)), LiveBarEvent::Partial(bar(240, 104.0))]),
        });
        let node = Arc::new(IngestionNode::new(
            "ingest-eth",
            bus,
            store.clone(),
            adapter,
            Arc::new(LiveClock),
            vec![key],
            IngestionConfig::default(),
        ));

        node.stream_live().await;

        let persisted = store.range(key, UnixSeconds(0), UnixSeconds(300)).await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].timestamp.0, 180);
    }
}
