use vertex_model::{Bar, Macd};

use crate::average::ExponentialMovingAverage;
use crate::indicator::{CompositeCalculator, Indicator};

/// MACD(12,26,9): two price EMAs and an EMA of their difference; warm-up is `slow + signal`
/// bars, since the signal EMA only starts accumulating once the slow EMA has a value (spec.md
/// §4.3).
pub struct MovingAverageConvergenceDivergence {
    fast: ExponentialMovingAverage,
    slow: ExponentialMovingAverage,
    signal: ExponentialMovingAverage,
}

impl MovingAverageConvergenceDivergence {
    #[must_use]
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast: ExponentialMovingAverage::new(fast_period),
            slow: ExponentialMovingAverage::new(slow_period),
            signal: ExponentialMovingAverage::new(signal_period),
        }
    }

    pub fn update_raw(&mut self, value: f64) -> Option<Macd> {
        self.fast.update_raw(value);
        self.slow.update_raw(value);
        if !self.slow.initialized() {
            return None;
        }
        let line = self.fast.raw_value() - self.slow.raw_value();
        self.signal.update_raw(line);
        self.value()
    }

    #[must_use]
    pub fn value(&self) -> Option<Macd> {
        self.signal.value().map(|signal| {
            let line = self.fast.raw_value() - self.slow.raw_value();
            Macd { line, signal, histogram: line - signal }
        })
    }
}

impl Indicator for MovingAverageConvergenceDivergence {
    fn name(&self) -> &'static str {
        "MovingAverageConvergenceDivergence"
    }

    fn initialized(&self) -> bool {
        self.signal.initialized()
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

impl CompositeCalculator for MovingAverageConvergenceDivergence {
    type Output = Macd;

    fn update(&mut self, bar: &Bar) -> Option<Macd> {
        self.update_raw(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn absent_until_slow_plus_signal_warmup_elapses() {
        let mut macd = MovingAverageConvergenceDivergence::new(2, 4, 3);
        let mut emitted_at = None;
        for step in 0..10 {
            if let Some(_value) = macd.update_raw(f64::from(step) + 1.0) {
                emitted_at = Some(step);
                break;
            }
        }
        assert_eq!(emitted_at, Some(5)); // slow(4) + signal(3) - 2, zero-indexed
    }

    #[rstest]
    fn histogram_is_line_minus_signal() {
        let mut macd = MovingAverageConvergenceDivergence::new(2, 3, 2);
        let mut last = None;
        for step in 0..10 {
            last = macd.update_raw(10.0 + f64::from(step));
        }
        let value = last.unwrap();
        assert!((value.histogram - (value.line - value.signal)).abs() < 1e-12);
    }

    #[rstest]
    fn reset_clears_all_three_emas() {
        let mut macd = MovingAverageConvergenceDivergence::new(2, 3, 2);
        for step in 0..10 {
            macd.update_raw(f64::from(step));
        }
        assert!(macd.initialized());
        macd.reset();
        assert!(!macd.initialized());
    }
}
