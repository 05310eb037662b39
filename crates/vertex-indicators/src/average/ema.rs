use vertex_model::Bar;

use crate::indicator::{Indicator, ScalarCalculator};

/// EMA(n): `k = 2 / (n + 1)`; the first update seeds the average from the first close; absent
/// until `n` warm-up samples have been seen (spec.md §4.3).
pub struct ExponentialMovingAverage {
    period: usize,
    k: f64,
    value: f64,
    count: usize,
}

impl ExponentialMovingAverage {
    /// # Panics
    /// Panics if `period` is zero.
    #[must_use]
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ExponentialMovingAverage: period must be > 0");
        Self { period, k: 2.0 / (period as f64 + 1.0), value: 0.0, count: 0 }
    }

    pub fn update_raw(&mut self, value: f64) -> Option<f64> {
        if self.count == 0 {
            self.value = value;
        } else {
            self.value = value * self.k + self.value * (1.0 - self.k);
        }
        self.count += 1;
        self.value()
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.initialized().then_some(self.value)
    }

    /// The raw running average, even before the warm-up threshold — used internally by
    /// calculators built on top of an EMA (RSI, MACD) that need the value as soon as seeding
    /// starts rather than waiting for this EMA's own warm-up to elapse.
    #[must_use]
    pub fn raw_value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Indicator for ExponentialMovingAverage {
    fn name(&self) -> &'static str {
        "ExponentialMovingAverage"
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.count = 0;
    }
}

impl ScalarCalculator for ExponentialMovingAverage {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.update_raw(bar.close)
    }
}
