use arraydeque::{ArrayDeque, Wrapping};
use vertex_model::Bar;

use crate::indicator::{Indicator, ScalarCalculator};

const MAX_PERIOD: usize = 1_024;

/// MA(n): running sum over a ring buffer of the last `n` closes. Absent until the window fills
/// (spec.md §4.3).
pub struct SimpleMovingAverage {
    period: usize,
    sum: f64,
    count: usize,
    buf: ArrayDeque<f64, MAX_PERIOD, Wrapping>,
}

impl SimpleMovingAverage {
    /// # Panics
    /// Panics if `period` is zero or exceeds the internal ring capacity.
    #[must_use]
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SimpleMovingAverage: period must be > 0");
        assert!(period <= MAX_PERIOD, "SimpleMovingAverage: period {period} exceeds {MAX_PERIOD}");
        Self { period, sum: 0.0, count: 0, buf: ArrayDeque::new() }
    }

    pub fn update_raw(&mut self, value: f64) -> Option<f64> {
        if self.count == self.period {
            if let Some(oldest) = self.buf.pop_front() {
                self.sum -= oldest;
            }
        } else {
            self.count += 1;
        }
        let _ = self.buf.push_back(value);
        self.sum += value;
        self.value()
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.initialized().then(|| self.sum / self.period as f64)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Indicator for SimpleMovingAverage {
    fn name(&self) -> &'static str {
        "SimpleMovingAverage"
    }

    fn initialized(&self) -> bool {
        self.count >= self.period
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
        self.buf.clear();
    }
}

impl ScalarCalculator for SimpleMovingAverage {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.update_raw(bar.close)
    }
}
