//! The unified trading engine (§4.9) and the async task manager backing the gateway's backtest
//! surface (§4.10).

pub mod engine;
pub mod tasks;

pub use engine::{OrderRouter, TradingEngine};
pub use tasks::{ProgressTracker, TaskEvent, TaskKind, TaskManager, TaskRecord, TaskStatus};
