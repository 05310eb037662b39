//! The four storage traits (spec.md §4.3, §4.4, §4.5, §4.9). Every method is `async` so a real
//! SQL-backed implementation can replace [`crate::in_memory::InMemoryStore`] without changing a
//! caller's code (ingestion/indicator nodes, the trading engine, the HTTP surface).

use async_trait::async_trait;
use vertex_core::TaskId;
use vertex_core::UnixSeconds;
use vertex_model::{Bar, BacktestResult, IndicatorRecord, SeriesKey, Signal};
use ustr::Ustr;

use crate::error::Result;

#[async_trait]
pub trait BarStore: Send + Sync {
    /// Upsert: republishing a bar already seen for this key+timestamp (e.g. after a retried
    /// gap-fill request) simply overwrites it.
    async fn persist(&self, bar: Bar) -> Result<()>;

    async fn range(&self, key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Bar>>;

    /// The most recent `n` bars at or before `before`, oldest first — used to warm up a fresh
    /// `CalculatorSet` (spec.md §4.3).
    async fn latest(&self, key: SeriesKey, before: UnixSeconds, n: usize) -> Result<Vec<Bar>>;
}

#[async_trait]
pub trait IndicatorStore: Send + Sync {
    /// Refuses to persist a record whose `engine_version_major` disagrees with whatever major
    /// version this key has already recorded (spec.md §4.3 versioning rule).
    async fn persist(&self, record: IndicatorRecord) -> Result<()>;

    async fn range(&self, key: SeriesKey, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<IndicatorRecord>>;

    async fn latest(&self, key: SeriesKey) -> Result<Option<IndicatorRecord>>;
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn persist(&self, signal: Signal) -> Result<()>;

    async fn range(&self, strategy: Ustr, symbol: Ustr, from: UnixSeconds, to: UnixSeconds) -> Result<Vec<Signal>>;
}

/// Keyed by the task id a backtest was submitted under, matching the `GET
/// /backtest/result/:task_id` HTTP endpoint (spec.md §6).
#[async_trait]
pub trait BacktestResultStore: Send + Sync {
    async fn save(&self, task_id: TaskId, result: BacktestResult) -> Result<()>;

    async fn get(&self, task_id: TaskId) -> Result<Option<BacktestResult>>;
}
