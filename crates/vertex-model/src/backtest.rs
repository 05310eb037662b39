//! The result bundle produced at the end of a backtest run (spec.md §4.9, step 6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::position::Trade;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BacktestResult {
    pub final_equity: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub trades: Vec<Trade>,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl BacktestResult {
    #[must_use]
    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }

    #[must_use]
    pub fn winning_trades(&self) -> usize {
        self.trades.iter().filter(|t| t.realized_pnl > 0.0).count()
    }
}
