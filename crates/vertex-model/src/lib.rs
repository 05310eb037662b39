//! The domain model shared by every layer of the engine: bars, indicator records, signals,
//! positions/trades, topics and the configuration documents of spec.md §6.

pub mod backtest;
pub mod bar;
pub mod config;
pub mod indicator;
pub mod position;
pub mod signal;
pub mod topic;

pub use backtest::BacktestResult;
pub use bar::{Bar, MarketKind, SeriesKey, Timeframe};
pub use config::{ConfigError, IndicatorMetadata, ParamSchema, SizingKind, SizingPresetDef, StrategyDefinition};
pub use indicator::{BollingerBands, IndicatorRecord, Macd, INDICATOR_ENGINE_VERSION};
pub use position::{Position, Trade};
pub use signal::{Action, Enhancement, Side, Signal, SignalKind};
pub use topic::Topic;
