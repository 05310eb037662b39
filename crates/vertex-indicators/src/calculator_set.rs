//! Composes the full calculator table (spec.md §4.3) into one `IndicatorRecord` per bar.

use vertex_model::{Bar, IndicatorRecord, SeriesKey};

use crate::average::{ExponentialMovingAverage, SimpleMovingAverage};
use crate::indicator::{CompositeCalculator, ScalarCalculator};
use crate::momentum::{MovingAverageConvergenceDivergence, RelativeStrengthIndex};
use crate::volatility::{AverageTrueRange, BollingerBandsCalculator};
use crate::volume::VolumeMovingAverage;

const RSI_PERIOD: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_STD: f64 = 2.0;
const ATR_PERIOD: usize = 14;
const VOLUME_MA_PERIOD: usize = 5;

/// The full set of calculators maintained for one `(symbol, timeframe, market_kind)` key. Every
/// calculator advances on every bar; absent fields in the emitted `IndicatorRecord` simply mean
/// that particular calculator hasn't warmed up yet.
pub struct CalculatorSet {
    key: SeriesKey,
    ma5: SimpleMovingAverage,
    ma10: SimpleMovingAverage,
    ma20: SimpleMovingAverage,
    ma60: SimpleMovingAverage,
    ma120: SimpleMovingAverage,
    ema12: ExponentialMovingAverage,
    ema26: ExponentialMovingAverage,
    rsi14: RelativeStrengthIndex,
    macd: MovingAverageConvergenceDivergence,
    bollinger: BollingerBandsCalculator,
    atr14: AverageTrueRange,
    volume_ma5: VolumeMovingAverage,
}

impl CalculatorSet {
    #[must_use]
    pub fn new(key: SeriesKey) -> Self {
        Self {
            key,
            ma5: SimpleMovingAverage::new(5),
            ma10: SimpleMovingAverage::new(10),
            ma20: SimpleMovingAverage::new(20),
            ma60: SimpleMovingAverage::new(60),
            ma120: SimpleMovingAverage::new(120),
            ema12: ExponentialMovingAverage::new(MACD_FAST),
            ema26: ExponentialMovingAverage::new(MACD_SLOW),
            rsi14: RelativeStrengthIndex::new(RSI_PERIOD),
            macd: MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL),
            bollinger: BollingerBandsCalculator::new(BOLLINGER_PERIOD, BOLLINGER_STD),
            atr14: AverageTrueRange::new(ATR_PERIOD),
            volume_ma5: VolumeMovingAverage::new(VOLUME_MA_PERIOD),
        }
    }

    /// The number of historical bars the indicator node must warm up from storage before this
    /// key's first live bar (spec.md §4.3: "largest `warmup + period`... currently 120 by
    /// default").
    #[must_use]
    pub fn warmup_bars_required() -> usize {
        120
    }

    /// Feeds one bar through every calculator and composes the resulting record. Calculators
    /// are stepped in a fixed order; none observes another's output (they are independent, not
    /// chained).
    pub fn process(&mut self, bar: &Bar) -> IndicatorRecord {
        let mut record = IndicatorRecord::new(self.key, bar.timestamp);
        record.ma5 = self.ma5.update(bar);
        record.ma10 = self.ma10.update(bar);
        record.ma20 = self.ma20.update(bar);
        record.ma60 = self.ma60.update(bar);
        record.ma120 = self.ma120.update(bar);
        record.ema12 = self.ema12.update(bar);
        record.ema26 = self.ema26.update(bar);
        record.rsi14 = self.rsi14.update(bar);
        record.macd = self.macd.update(bar);
        record.bollinger = self.bollinger.update(bar);
        record.atr14 = self.atr14.update(bar);
        record.volume_ma5 = self.volume_ma5.update(bar);
        record
    }

    #[must_use]
    pub fn key(&self) -> SeriesKey {
        self.key
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use vertex_model::{MarketKind, Timeframe};

    use super::*;

    fn bar(ts: i64, close: f64) -> Bar {
        Bar {
            symbol: "ETHUSDT".into(),
            timeframe: Timeframe::Minute1,
            market_kind: MarketKind::Spot,
            timestamp: vertex_core::UnixSeconds(ts),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    #[rstest]
    fn all_fields_absent_on_first_bar() {
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let mut set = CalculatorSet::new(key);
        let record = set.process(&bar(0, 100.0));
        assert!(record.ma5.is_none());
        assert!(record.rsi14.is_none());
        assert!(record.macd.is_none());
        assert!(record.bollinger.is_none());
    }

    #[rstest]
    fn short_period_fields_populate_before_long_period_fields() {
        let key = SeriesKey::new("ETHUSDT", Timeframe::Minute1, MarketKind::Spot);
        let mut set = CalculatorSet::new(key);
        let mut last = None;
        for i in 0..20 {
            last = Some(set.process(&bar(i, 100.0 + i as f64)));
        }
        let record = last.unwrap();
        assert!(record.ma5.is_some());
        assert!(record.ma10.is_some());
        assert!(record.ma20.is_some());
        assert!(record.ma60.is_none());
        assert!(record.bollinger.is_some());
    }

    #[rstest]
    fn record_key_matches_calculator_set_key() {
        let key = SeriesKey::new("BTCUSDT", Timeframe::Hour1, MarketKind::Perpetual);
        let mut set = CalculatorSet::new(key);
        let record = set.process(&bar(0, 50_000.0));
        assert_eq!(record.key(), key);
    }
}
