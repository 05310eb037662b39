//! Backtest performance statistics (spec.md §4.9, §8): win rate, profit factor, a Sharpe proxy
//! and max drawdown, composed into one [`PerformanceReport`] per run.

pub mod report;
pub mod statistic;
pub mod statistics;

pub use report::PerformanceReport;
pub use statistic::{PortfolioStatistic, Returns};
pub use statistics::{MaxDrawdown, ProfitFactor, SharpeRatio, WinRate};
