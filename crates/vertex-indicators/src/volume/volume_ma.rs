use vertex_model::Bar;

use crate::average::SimpleMovingAverage;
use crate::indicator::{Indicator, ScalarCalculator};

/// Volume-MA(5): a plain [`SimpleMovingAverage`] fed `bar.volume` instead of `bar.close`, used
/// by the strategy framework's volume-floor confirmation filter (spec.md §4.6).
pub struct VolumeMovingAverage {
    inner: SimpleMovingAverage,
}

impl VolumeMovingAverage {
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self { inner: SimpleMovingAverage::new(period) }
    }

    pub fn update_raw(&mut self, volume: f64) -> Option<f64> {
        self.inner.update_raw(volume)
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.inner.value()
    }
}

impl Indicator for VolumeMovingAverage {
    fn name(&self) -> &'static str {
        "VolumeMovingAverage"
    }

    fn initialized(&self) -> bool {
        self.inner.initialized()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

impl ScalarCalculator for VolumeMovingAverage {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.inner.update_raw(bar.volume)
    }
}
