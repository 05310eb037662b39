/// Maximum observed peak-to-trough decline of an equity curve, as a positive fraction of the
/// peak (spec.md §4.9: "max drawdown"). Unlike the other statistics this walks equity levels
/// directly rather than a return series, since an equity curve is what the trading engine
/// already tracks bar-by-bar.
#[derive(Debug, Default)]
pub struct MaxDrawdown;

impl MaxDrawdown {
    #[must_use]
    pub fn calculate(&self, equity_curve: &[f64]) -> f64 {
        if equity_curve.is_empty() {
            return 0.0;
        }
        let mut peak = equity_curve[0];
        let mut max_drawdown = 0.0_f64;
        for &equity in equity_curve {
            if equity > peak {
                peak = equity;
            }
            if peak > 0.0 {
                let drawdown = (peak - equity) / peak;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }
        max_drawdown
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn empty_curve_is_zero() {
        assert_eq!(MaxDrawdown.calculate(&[]), 0.0);
    }

    #[rstest]
    fn monotonically_rising_curve_has_no_drawdown() {
        assert_eq!(MaxDrawdown.calculate(&[100.0, 110.0, 120.0, 130.0]), 0.0);
    }

    #[rstest]
    fn finds_the_deepest_drop_even_after_partial_recovery() {
        let curve = [100.0, 120.0, 90.0, 100.0, 60.0, 80.0];
        let result = MaxDrawdown.calculate(&curve);
        assert!((result - (120.0 - 60.0) / 120.0).abs() < 1e-9);
    }

    #[rstest]
    fn new_peak_resets_the_reference_point() {
        let curve = [100.0, 50.0, 150.0, 140.0];
        let result = MaxDrawdown.calculate(&curve);
        // worst drawdown is 100 -> 50 (50%), not 150 -> 140 (~6.7%)
        assert!((result - 0.5).abs() < 1e-9);
    }
}
