//! Ties the individual statistics together into the bundle the trading engine attaches to a
//! `BacktestResult` (spec.md §4.9).

use vertex_core::UnixSeconds;
use vertex_model::Trade;

use crate::statistic::{PortfolioStatistic, Returns};
use crate::statistics::{MaxDrawdown, ProfitFactor, SharpeRatio, WinRate};

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct PerformanceReport {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

impl PerformanceReport {
    /// `equity_curve` is the bar-by-bar mark-to-market equity series in chronological order;
    /// period-over-period percentage changes become the return series Sharpe is computed over.
    #[must_use]
    pub fn compute(trades: &[Trade], equity_curve: &[(UnixSeconds, f64)]) -> Self {
        let realized_pnls: Vec<f64> = trades.iter().map(|t| t.realized_pnl).collect();
        let returns = percentage_returns(equity_curve);
        let equity_values: Vec<f64> = equity_curve.iter().map(|(_, e)| *e).collect();

        Self {
            win_rate: WinRate.calculate_from_realized_pnls(&realized_pnls).unwrap_or(0.0),
            profit_factor: ProfitFactor.calculate_from_realized_pnls(&realized_pnls).unwrap_or(f64::NAN),
            sharpe_ratio: SharpeRatio::default().calculate_from_returns(&returns).unwrap_or(f64::NAN),
            max_drawdown: MaxDrawdown.calculate(&equity_values),
        }
    }
}

fn percentage_returns(equity_curve: &[(UnixSeconds, f64)]) -> Returns {
    equity_curve
        .windows(2)
        .filter_map(|pair| {
            let (_, prev) = pair[0];
            let (ts, curr) = pair[1];
            (prev != 0.0).then(|| (ts, (curr - prev) / prev))
        })
        .collect()
}
