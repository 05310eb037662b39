use vertex_model::Bar;

use crate::average::ExponentialMovingAverage;
use crate::indicator::{Indicator, ScalarCalculator};

/// RSI(14): EMA of gains and EMA of losses; `value = 100 - 100 / (1 + avgGain/avgLoss)`, bounded
/// to `[0, 100]` (spec.md §4.3).
pub struct RelativeStrengthIndex {
    period: usize,
    average_gain: ExponentialMovingAverage,
    average_loss: ExponentialMovingAverage,
    last_value: f64,
    has_inputs: bool,
    value: f64,
}

impl RelativeStrengthIndex {
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self {
            period,
            average_gain: ExponentialMovingAverage::new(period),
            average_loss: ExponentialMovingAverage::new(period),
            last_value: 0.0,
            has_inputs: false,
            value: 0.0,
        }
    }

    pub fn update_raw(&mut self, value: f64) -> Option<f64> {
        if !self.has_inputs {
            self.last_value = value;
            self.has_inputs = true;
        }
        let delta = value - self.last_value;
        self.last_value = value;
        if delta > 0.0 {
            self.average_gain.update_raw(delta);
            self.average_loss.update_raw(0.0);
        } else if delta < 0.0 {
            self.average_gain.update_raw(0.0);
            self.average_loss.update_raw(-delta);
        } else {
            self.average_gain.update_raw(0.0);
            self.average_loss.update_raw(0.0);
        }

        let avg_loss = self.average_loss.raw_value();
        self.value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = self.average_gain.raw_value() / avg_loss;
            (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
        };
        self.value()
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.initialized().then_some(self.value)
    }
}

impl Indicator for RelativeStrengthIndex {
    fn name(&self) -> &'static str {
        "RelativeStrengthIndex"
    }

    fn initialized(&self) -> bool {
        self.average_gain.count() >= self.period
    }

    fn reset(&mut self) {
        self.average_gain.reset();
        self.average_loss.reset();
        self.last_value = 0.0;
        self.has_inputs = false;
        self.value = 0.0;
    }
}

impl ScalarCalculator for RelativeStrengthIndex {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.update_raw(bar.close)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn all_higher_inputs_push_value_to_ceiling() {
        let mut rsi = RelativeStrengthIndex::new(3);
        for i in 1..6 {
            rsi.update_raw(f64::from(i));
        }
        assert_eq!(rsi.value(), Some(100.0));
    }

    #[rstest]
    fn all_lower_inputs_push_value_to_floor() {
        let mut rsi = RelativeStrengthIndex::new(3);
        for i in (1..6).rev() {
            rsi.update_raw(f64::from(i));
        }
        assert_eq!(rsi.value(), Some(0.0));
    }

    /// Literal scenario 3 from spec.md §8: 30 steps of +1 from 100 through RSI(14) stay in
    /// [0, 100] and cross above 50 after the warm-up step.
    #[rstest]
    fn thirty_steps_of_monotonic_gain_stay_bounded_and_cross_fifty() {
        let mut rsi = RelativeStrengthIndex::new(14);
        let mut price = 100.0;
        let mut seen_above_fifty = false;
        for step in 0..30 {
            price += 1.0;
            if let Some(value) = rsi.update_raw(price) {
                assert!((0.0..=100.0).contains(&value), "step {step}: {value} out of bounds");
                if step >= 14 {
                    assert!(value > 50.0, "step {step}: expected > 50, got {value}");
                    seen_above_fifty = true;
                }
            }
        }
        assert!(seen_above_fifty);
    }

    #[rstest]
    fn absent_before_warmup() {
        let mut rsi = RelativeStrengthIndex::new(5);
        for i in 0..4 {
            assert_eq!(rsi.update_raw(f64::from(i)), None);
        }
    }
}
