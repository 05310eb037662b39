//! The common statistic trait. Each implementation picks whichever `calculate_from_*` method
//! fits the data it consumes and leaves the rest panicking, matching the teacher's
//! `PortfolioStatistic` convention of one fat trait over several narrow implementers.

use std::collections::BTreeMap;

use vertex_core::UnixSeconds;

/// A return series keyed by the timestamp it was observed at.
pub type Returns = BTreeMap<UnixSeconds, f64>;

const IMPL_ERR: &str = "is not implemented for";

#[allow(unused_variables)]
pub trait PortfolioStatistic {
    type Item;

    fn name(&self) -> &'static str;

    fn calculate_from_returns(&self, returns: &Returns) -> Option<Self::Item> {
        panic!("`calculate_from_returns` {IMPL_ERR} `{}`", self.name());
    }

    fn calculate_from_realized_pnls(&self, realized_pnls: &[f64]) -> Option<Self::Item> {
        panic!("`calculate_from_realized_pnls` {IMPL_ERR} `{}`", self.name());
    }

    fn check_valid_returns(&self, returns: &Returns) -> bool {
        !returns.is_empty()
    }

    /// Sums same-day returns into one bin per calendar day (86,400 seconds), matching the
    /// teacher's daily-downsample step ahead of an annualized standard deviation.
    fn downsample_to_daily_bins(&self, returns: &Returns) -> Returns {
        const SECONDS_PER_DAY: i64 = 86_400;
        let mut daily = BTreeMap::new();
        for (&ts, &value) in returns {
            let day_start = UnixSeconds(ts.0 - ts.0.rem_euclid(SECONDS_PER_DAY));
            *daily.entry(day_start).or_insert(0.0) += value;
        }
        daily
    }

    fn calculate_std(&self, returns: &Returns) -> f64 {
        let n = returns.len() as f64;
        if n < 2.0 {
            return f64::NAN;
        }
        let mean = returns.values().sum::<f64>() / n;
        let variance = returns.values().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    }
}
