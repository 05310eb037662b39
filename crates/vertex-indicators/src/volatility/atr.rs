use vertex_model::Bar;

use crate::average::ExponentialMovingAverage;
use crate::indicator::{Indicator, ScalarCalculator};

/// ATR(14): `TR = max(h-l, |h-prev_close|, |l-prev_close|)`; ATR is an EMA of `TR`. The first
/// bar has no previous close, so `TR` is simply `h - l` (spec.md §4.3).
pub struct AverageTrueRange {
    prev_close: Option<f64>,
    tr_ema: ExponentialMovingAverage,
}

impl AverageTrueRange {
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self { prev_close: None, tr_ema: ExponentialMovingAverage::new(period) }
    }

    pub fn update_hlc(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = match self.prev_close {
            None => high - low,
            Some(prev) => (high - low).max((high - prev).abs()).max((low - prev).abs()),
        };
        self.prev_close = Some(close);
        self.tr_ema.update_raw(tr.max(0.0)).map(|v| v.max(0.0))
    }

    #[must_use]
    pub fn value(&self) -> Option<f64> {
        self.tr_ema.value().map(|v| v.max(0.0))
    }
}

impl Indicator for AverageTrueRange {
    fn name(&self) -> &'static str {
        "AverageTrueRange"
    }

    fn initialized(&self) -> bool {
        self.tr_ema.initialized()
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.tr_ema.reset();
    }
}

impl ScalarCalculator for AverageTrueRange {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.update_hlc(bar.high, bar.low, bar.close)
    }
}
