//! A `BTreeMap`-indexed implementation of all four storage traits, used by tests and as the
//! default store when no external one is configured (spec.md §6: "concrete SQL wiring is an
//! implementation detail left to a deployer").

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use ustr::Ustr;
use vertex_core::{TaskId, UnixSeconds};
use vertex_model::{Bar, BacktestResult, IndicatorRecord, SeriesKey, Signal};

use crate::error::{Result, StoreError};
use crate::traits::{BacktestResultStore, BarStore, IndicatorStore, SignalStore};

#[derive(Default)]
pub struct InMemoryStore {
    bars: Mutex<HashMap<SeriesKey, BTreeMap<i64, Bar>>>,
    indicators: Mutex<HashMap<SeriesKey, (u32, BTreeMap<i64, IndicatorRecord>)>>,
    signals: Mutex<HashMap<(Ustr, Ustr), BTreeMap<i64, Vec<Signal>>>>,
    backtests: Mutex<HashMap<TaskId, BacktestResult>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BarStore for InMemoryStore {
    async fn persist(&self, bar: Bar) -> Result<()> {
        let mut bars = self.bars.lock().expect("bar store lock poisoned");
        bars.entry(bar.key()).or_default().insert(bar.timestamp.0, bar);
        Ok(())
    }

    async fn range(&self, key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Bar>> {
        let bars = self.bars.lock().expect("bar store lock poisoned");
        Ok(bars.get(&key).map_or_else(Vec::new, |series| {
            series.range(from.0..=to.0).map(|(_, bar)| *bar).collect()
        }))
    }

    async fn latest(&self, key: SeriesKey, before: UnixSeconds, n: usize) -> Result<Vec<Bar>> {
        let bars = self.bars.lock().expect("bar store lock poisoned");
        Ok(bars.get(&key).map_or_else(Vec::new, |series| {
            let mut tail: Vec<Bar> = series.range(..=before.0).map(|(_, bar)| *bar).collect();
            let start = tail.len().saturating_sub(n);
            tail.split_off(start)
        }))
    }
}

#[async_trait]
impl IndicatorStore for InMemoryStore {
    async fn persist(&self, record: IndicatorRecord) -> Result<()> {
        let mut indicators = self.indicators.lock().expect("indicator store lock poisoned");
        let entry = indicators.entry(record.key()).or_insert_with(|| (record.engine_version_major, BTreeMap::new()));
        if entry.0 != record.engine_version_major {
            return Err(StoreError::EngineVersionMismatch { record: record.engine_version_major, expected: entry.0 });
        }
        entry.1.insert(record.timestamp.0, record);
        Ok(())
    }

    async fn range(&self, key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<IndicatorRecord>> {
        let indicators = self.indicators.lock().expect("indicator store lock poisoned");
        Ok(indicators
            .get(&key)
            .map_or_else(Vec::new, |(_, series)| series.range(from.0..=to.0).map(|(_, r)| *r).collect()))
    }

    async fn latest(&self, key: SeriesKey) -> Result<Option<IndicatorRecord>> {
        let indicators = self.indicators.lock().expect("indicator store lock poisoned");
        Ok(indicators.get(&key).and_then(|(_, series)| series.values().next_back().copied()))
    }
}

#[async_trait]
impl SignalStore for InMemoryStore {
    async fn persist(&self, signal: Signal) -> Result<()> {
        let mut signals = self.signals.lock().expect("signal store lock poisoned");
        signals
            .entry((signal.strategy_name, signal.symbol))
            .or_default()
            .entry(signal.timestamp.0)
            .or_default()
            .push(signal);
        Ok(())
    }

    async fn range(&self, strategy: Ustr, symbol: Ustr, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Signal>> {
        let signals = self.signals.lock().expect("signal store lock poisoned");
        Ok(signals
            .get(&(strategy, symbol))
            .map_or_else(Vec::new, |series| series.range(from.0..=to.0).flat_map(|(_, v)| v.clone()).collect()))
    }
}

#[async_trait]
impl BacktestResultStore for InMemoryStore {
    async fn save(&self, task_id: TaskId, result: BacktestResult) -> Result<()> {
        self.backtests.lock().expect("backtest store lock poisoned").insert(task_id, result);
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<BacktestResult>> {
        Ok(self.backtests.lock().expect("backtest store lock poisoned").get(&task_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use vertex_model::{MarketKind, Timeframe};

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

    #[tokio::test]
    async fn bar_persist_then_range_round_trips() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.persist(bar(i * 60, 100.0 + i as f64)).await.unwrap();
        }
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let got = store.range(key, UnixSeconds(60), UnixSeconds(180)).await.unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].timestamp, UnixSeconds(60));
    }

    #[tokio::test]
    async fn bar_persist_is_an_upsert() {
        let store = InMemoryStore::new();
        store.persist(bar(0, 100.0)).await.unwrap();
        store.persist(bar(0, 105.0)).await.unwrap();
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let got = store.range(key, UnixSeconds(0), UnixSeconds(0)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].close, 105.0);
    }

    #[tokio::test]
    async fn latest_returns_the_newest_n_bars_oldest_first() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store.persist(bar(i * 60, 100.0 + i as f64)).await.unwrap();
        }
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let got = store.latest(key, UnixSeconds(9 * 60), 3).await.unwrap();
        assert_eq!(got.iter().map(|b| b.timestamp.0).collect::<Vec<_>>(), vec![420, 480, 540]);
    }

    #[tokio::test]
    async fn indicator_store_refuses_a_major_version_mismatch() {
        let store = InMemoryStore::new();
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let mut rec = IndicatorRecord::new(key, UnixSeconds(0));
        store.persist(rec).await.unwrap();

        rec.engine_version_major += 1;
        let err = store.persist(rec).await.unwrap_err();
        assert!(matches!(err, StoreError::EngineVersionMismatch { .. }));
    }

    #[tokio::test]
    async fn backtest_result_round_trips_by_task_id() {
        let store = InMemoryStore::new();
        let task_id = TaskId::new();
        let result = BacktestResult {
            final_equity: Default::default(),
            realized_pnl: Default::default(),
            unrealized_pnl: Default::default(),
            trades: vec![],
            win_rate: 1.0,
            profit_factor: 2.5,
            sharpe_ratio: 1.2,
            max_drawdown: 0.0,
        };
        store.save(task_id, result.clone()).await.unwrap();
        assert_eq!(store.get(task_id).await.unwrap(), Some(result));
        assert_eq!(store.get(TaskId::new()).await.unwrap(), None);
    }
}
