//! The five position-sizing formulas of spec.md §4.7's table, dispatched by `match` over a
//! closed, compile-time-fixed set of variants.

use vertex_model::{IndicatorRecord, Signal};

#[derive(Clone, Copy, Debug)]
pub enum SizingStrategy {
    FixedAmount { amount: f64 },
    FixedPercentage { fraction: f64 },
    RiskBased { risk_fraction: f64 },
    Kelly { win_rate: f64, payoff_ratio: f64 },
    VolatilityAdjusted { base_pct: f64 },
}

impl SizingStrategy {
    /// Raw dollar amount before the position manager's single-position and total-exposure caps
    /// (spec.md §4.7 table). Each arm's own cap, where the table specifies one, is applied here.
    #[must_use]
    pub fn raw_size(&self, equity: f64, signal: &Signal, ind: &IndicatorRecord) -> f64 {
        match *self {
            SizingStrategy::FixedAmount { amount } => amount.min(0.5 * equity),
            SizingStrategy::FixedPercentage { fraction } => fraction * equity,
            SizingStrategy::RiskBased { risk_fraction } => match signal.stop_loss {
                Some(stop) if signal.price > 0.0 && stop != signal.price => {
                    let risk_per_unit_fraction = (signal.price - stop).abs() / signal.price;
                    ((risk_fraction * equity) / risk_per_unit_fraction).min(0.5 * equity)
                }
                _ => 0.1 * equity,
            },
            SizingStrategy::Kelly { win_rate, payoff_ratio } => {
                if payoff_ratio <= 0.0 {
                    return 0.0;
                }
                let kelly_fraction = 0.5 * ((win_rate * payoff_ratio - (1.0 - win_rate)) / payoff_ratio);
                kelly_fraction.clamp(0.01, 0.25) * equity
            }
            SizingStrategy::VolatilityAdjusted { base_pct } => {
                let atr = ind.atr14.unwrap_or(0.0);
                if signal.price > 0.0 {
                    base_pct * equity / (1.0 + 20.0 * atr / signal.price)
                } else {
                    base_pct * equity
                }
            }
        }
    }
}
