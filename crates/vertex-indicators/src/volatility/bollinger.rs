use arraydeque::{ArrayDeque, Wrapping};
use vertex_model::{Bar, BollingerBands};

use crate::indicator::{CompositeCalculator, Indicator};

const MAX_PERIOD: usize = 1_024;

/// Bollinger(20,2): running `Σx` and `Σx²` over the last `period` closes; variance is clamped
/// to zero to guard against tiny negative drift from floating-point cancellation (spec.md
/// §4.3).
pub struct BollingerBandsCalculator {
    period: usize,
    num_std: f64,
    sum: f64,
    sum_sq: f64,
    count: usize,
    buf: ArrayDeque<f64, MAX_PERIOD, Wrapping>,
}

impl BollingerBandsCalculator {
    /// # Panics
    /// Panics if `period` is zero or exceeds the internal ring capacity.
    #[must_use]
    pub fn new(period: usize, num_std: f64) -> Self {
        assert!(period > 0, "BollingerBandsCalculator: period must be > 0");
        assert!(period <= MAX_PERIOD, "BollingerBandsCalculator: period {period} exceeds {MAX_PERIOD}");
        Self { period, num_std, sum: 0.0, sum_sq: 0.0, count: 0, buf: ArrayDeque::new() }
    }

    pub fn update_raw(&mut self, value: f64) -> Option<BollingerBands> {
        if self.count == self.period {
            if let Some(oldest) = self.buf.pop_front() {
                self.sum -= oldest;
                self.sum_sq -= oldest * oldest;
            }
        } else {
            self.count += 1;
        }
        let _ = self.buf.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;
        self.value()
    }

    #[must_use]
    pub fn value(&self) -> Option<BollingerBands> {
        if !self.initialized() {
            return None;
        }
        let n = self.period as f64;
        let middle = self.sum / n;
        let variance = (self.sum_sq / n - middle * middle).max(0.0);
        let band = self.num_std * variance.sqrt();
        Some(BollingerBands { upper: middle + band, middle, lower: middle - band })
    }
}

impl Indicator for BollingerBandsCalculator {
    fn name(&self) -> &'static str {
        "BollingerBandsCalculator"
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.count = 0;
        self.buf.clear();
    }
}

impl CompositeCalculator for BollingerBandsCalculator {
    type Output = BollingerBands;

    fn update(&mut self, bar: &Bar) -> Option<BollingerBands> {
        self.update_raw(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn constant_series_has_zero_width_bands() {
        let mut bb = BollingerBandsCalculator::new(5, 2.0);
        let mut last = None;
        for _ in 0..5 {
            last = bb.update_raw(10.0);
        }
        let bands = last.unwrap();
        assert!((bands.middle - 10.0).abs() < 1e-9);
        assert!((bands.upper - bands.middle).abs() < 1e-9);
        assert!((bands.lower - bands.middle).abs() < 1e-9);
    }

    #[rstest]
    fn absent_until_window_fills() {
        let mut bb = BollingerBandsCalculator::new(4, 2.0);
        for _ in 0..3 {
            assert!(bb.update_raw(1.0).is_none());
        }
        assert!(bb.update_raw(1.0).is_some());
    }

    #[rstest]
    fn variance_never_negative_even_under_float_noise() {
        let mut bb = BollingerBandsCalculator::new(3, 2.0);
        for value in [1e10, 1e10 + 1e-6, 1e10 - 1e-6] {
            bb.update_raw(value);
        }
        let bands = bb.value().unwrap();
        assert!(bands.upper >= bands.middle);
        assert!(bands.lower <= bands.middle);
    }

    #[rstest]
    fn upper_always_above_or_equal_lower() {
        let mut bb = BollingerBandsCalculator::new(5, 2.0);
        for i in 0..20 {
            if let Some(bands) = bb.update_raw(f64::from(i % 7) * 3.3) {
                assert!(bands.upper >= bands.lower);
            }
        }
    }
}
