use crate::statistic::PortfolioStatistic;

/// Gross profit divided by gross loss across closed trades. `NaN` when there are no losing
/// trades to divide by — there is no meaningful ratio, not an infinite one.
#[derive(Debug, Default)]
pub struct ProfitFactor;

impl PortfolioStatistic for ProfitFactor {
    type Item = f64;

    fn name(&self) -> &'static str {
        "ProfitFactor"
    }

    fn calculate_from_realized_pnls(&self, realized_pnls: &[f64]) -> Option<f64> {
        if realized_pnls.is_empty() {
            return Some(f64::NAN);
        }
        let (gross_profit, gross_loss) = realized_pnls.iter().fold((0.0, 0.0), |(profit, loss), &pnl| {
            if pnl >= 0.0 { (profit + pnl, loss) } else { (profit, loss + pnl) }
        });
        if gross_loss == 0.0 {
            return Some(f64::NAN);
        }
        Some((gross_profit / gross_loss).abs())
    }
}
