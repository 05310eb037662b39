//! Maintains a per-key calculator set and publishes indicator records for every incoming bar
//! (spec.md §4.5). Implements [`NodeHandler`] so it runs inside a
//! [`vertex_common::node::NodeRuntime`] subscribed to the tracked `bar.<...>` topics.

use std::{collections::HashMap, sync::Arc, time::Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, trace, warn};
use vertex_common::{MessageBus, NodeHandler};
use vertex_core::{ErrorKind, VertexError};
use vertex_indicators::CalculatorSet;
use vertex_model::{Bar, SeriesKey, Topic};
use vertex_persistence::{BarStore, IndicatorStore};

/// p99 latency thresholds for the whole calculator set, per bar (spec.md §4.5).
const LATENCY_WARN_MS: u128 = 30;
const LATENCY_CRITICAL_MS: u128 = 50;

/// For each incoming bar: warm up a calculator set on first sight of its key, feed the bar
/// through every calculator, persist the composed record, and publish it.
pub struct IndicatorNodeHandler {
    name: String,
    bus: Arc<MessageBus>,
    bar_store: Arc<dyn BarStore>,
    indicator_store: Arc<dyn IndicatorStore>,
    sets: Mutex<HashMap<SeriesKey, CalculatorSet>>,
}

impl IndicatorNodeHandler {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        bus: Arc<MessageBus>,
        bar_store: Arc<dyn BarStore>,
        indicator_store: Arc<dyn IndicatorStore>,
    ) -> Self {
        Self { name: name.into(), bus, bar_store, indicator_store, sets: Mutex::new(HashMap::new()) }
    }

    /// Reads up to [`CalculatorSet::warmup_bars_required`] historical bars for `key` and feeds
    /// them through a fresh calculator set so its first *live* bar already has warmed-up fields
    /// where history allows (spec.md §4.3, §4.5 step 1).
    async fn warmed_up_set(&self, key: SeriesKey, as_of: vertex_core::UnixSeconds) -> Result<CalculatorSet, VertexError> {
        let mut set = CalculatorSet::new(key);
        let history = self.bar_store.latest(key, as_of, CalculatorSet::warmup_bars_required()).await?;
        for bar in &history {
            set.process(bar);
        }
        Ok(set)
    }
}

#[async_trait]
impl NodeHandler for IndicatorNodeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, topic: Topic, payload: &[u8]) -> Result<(), VertexError> {
        let start = Instant::now();
        let bar: Bar = serde_json::from_slice(payload)
            .map_err(|err| VertexError::new(ErrorKind::Validation, format!("malformed bar payload: {err}")))?;
        let key = bar.key();

        if !self.sets.lock().await.contains_key(&key) {
            let set = self.warmed_up_set(key, bar.timestamp).await?;
            self.sets.lock().await.entry(key).or_insert(set);
        }

        let record = {
            let mut sets = self.sets.lock().await;
            let set = sets.get_mut(&key).expect("calculator set was just inserted for this key");
            set.process(&bar)
        };

        self.indicator_store.persist(record).await?;
        self.bus.publish_json(Topic::indicator(key), &record);

        let elapsed = start.elapsed().as_millis();
        if elapsed >= LATENCY_CRITICAL_MS {
            error!(node = %self.name, %topic, elapsed_ms = elapsed, "indicator processing exceeded critical latency budget");
        } else if elapsed >= LATENCY_WARN_MS {
            warn!(node = %self.name, %topic, elapsed_ms = elapsed, "indicator processing exceeded warning latency budget");
        } else {
            trace!(node = %self.name, %topic, elapsed_ms = elapsed, "indicator processed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vertex_core::UnixSeconds;
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
            volume: 100.0,
        }
    }

    #[tokio::test]
    async fn first_bar_for_a_key_initializes_a_fresh_calculator_set() {
        let bus = Arc::new(MessageBus::default());
        let store = Arc::new(InMemoryStore::new());
        let handler = IndicatorNodeHandler::new("indicator", bus.clone(), store.clone(), store.clone());
        let mut sub = bus.subscribe(Topic::indicator(bar(0, 100.0).key()), None).unwrap();

        let b = bar(0, 100.0);
        let payload = serde_json::to_vec(&b).unwrap();
        handler.process(Topic::bar(b.key()), &payload).await.unwrap();

        let msg = sub.recv().await.unwrap();
        let record: vertex_model::IndicatorRecord = serde_json::from_slice(&msg.payload).unwrap();
        assert!(record.ma5.is_none());
    }

    #[tokio::test]
    async fn warms_up_from_persisted_history_before_first_live_bar() {
        let bus = Arc::new(MessageBus::default());
        let store = Arc::new(InMemoryStore::new());
        for i in 0..10 {
            BarStore::persist(store.as_ref(), bar(i * 60, 100.0 + i as f64)).await.unwrap();
        }
        let handler = IndicatorNodeHandler::new("indicator", bus, store.clone(), store.clone());

        let live = bar(600, 110.0);
        let payload = serde_json::to_vec(&live).unwrap();
        handler.process(Topic::bar(live.key()), &payload).await.unwrap();

        let key = live.key();
        let persisted = IndicatorStore::latest(store.as_ref(), key).await.unwrap();
        assert!(persisted.is_some_and(|record| record.ma5.is_some()));
    }

    #[tokio::test]
    async fn rejects_a_malformed_payload_without_panicking() {
        let bus = Arc::new(MessageBus::default());
        let store = Arc::new(InMemoryStore::new());
        let handler = IndicatorNodeHandler::new("indicator", bus, store.clone(), store);
        let err = handler.process(Topic::from_raw("bar.x.minute1.spot"), b"not json").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
