use crate::statistic::{PortfolioStatistic, Returns};

const DEFAULT_ANNUALIZATION_PERIOD: usize = 252;

/// A Sharpe-ratio proxy: mean over standard deviation of daily-binned returns, annualized by
/// `sqrt(period)` (spec.md §4.9's "Sharpe proxy").
#[derive(Debug)]
pub struct SharpeRatio {
    period: usize,
}

impl Default for SharpeRatio {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SharpeRatio {
    #[must_use]
    pub fn new(period: Option<usize>) -> Self {
        Self { period: period.unwrap_or(DEFAULT_ANNUALIZATION_PERIOD) }
    }
}

impl PortfolioStatistic for SharpeRatio {
    type Item = f64;

    fn name(&self) -> &'static str {
        "SharpeRatio"
    }

    fn calculate_from_returns(&self, raw_returns: &Returns) -> Option<f64> {
        if !self.check_valid_returns(raw_returns) {
            return Some(f64::NAN);
        }
        let returns = self.downsample_to_daily_bins(raw_returns);
        let mean = returns.values().sum::<f64>() / returns.len() as f64;
        let std = self.calculate_std(&returns);
        if std < f64::EPSILON || std.is_nan() {
            return Some(f64::NAN);
        }
        Some((mean / std) * (self.period as f64).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use vertex_core::UnixSeconds;

    use super::*;

    fn returns(values: &[f64]) -> Returns {
        const SECONDS_PER_DAY: i64 = 86_400;
        values.iter().enumerate().map(|(i, &v)| (UnixSeconds(i as i64 * SECONDS_PER_DAY), v)).collect()
    }

    #[rstest]
    fn empty_returns_is_nan() {
        let result = SharpeRatio::default().calculate_from_returns(&returns(&[])).unwrap();
        assert!(result.is_nan());
    }

    #[rstest]
    fn zero_volatility_is_nan() {
        let result = SharpeRatio::default().calculate_from_returns(&returns(&[0.01; 10])).unwrap();
        assert!(result.is_nan());
    }

    #[rstest]
    fn positive_drift_yields_positive_ratio() {
        let result =
            SharpeRatio::new(Some(252)).calculate_from_returns(&returns(&[0.01, -0.002, 0.015, -0.001, 0.02])).unwrap();
        assert!(result > 0.0);
    }
}
