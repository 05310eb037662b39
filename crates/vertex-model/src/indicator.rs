//! The indicator record (spec.md §3) and its engine version.

use serde::{Deserialize, Serialize};
use ustr::Ustr;
use vertex_core::UnixSeconds;

use crate::bar::{MarketKind, SeriesKey, Timeframe};

/// Semantic version of the indicator engine. A consumer persisting records alongside this
/// version must refuse to mix values from different major versions (spec.md §4.3).
pub const INDICATOR_ENGINE_VERSION: &str = "2.0.0";

#[must_use]
pub fn indicator_engine_major_version() -> u32 {
    INDICATOR_ENGINE_VERSION
        .split('.')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// MACD's three published values.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Bollinger bands' three published values.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// One record per `(key, timestamp)` (spec.md §3). Every field is `Option` because a calculator
/// still warming up, or one that hit a domain error, emits absent rather than a synthetic value
/// (spec.md §7 kind 4).
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub symbol: Ustr,
    pub timeframe: Timeframe,
    pub market_kind: MarketKind,
    pub timestamp: UnixSeconds,
    pub engine_version_major: u32,

    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma120: Option<f64>,
    pub ema12: Option<f64>,
    pub ema26: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<Macd>,
    pub bollinger: Option<BollingerBands>,
    pub atr14: Option<f64>,
    pub volume_ma5: Option<f64>,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Minute1
    }
}

impl Default for MarketKind {
    fn default() -> Self {
        MarketKind::Spot
    }
}

impl IndicatorRecord {
    #[must_use]
    pub fn new(key: SeriesKey, timestamp: UnixSeconds) -> Self {
        Self {
            symbol: key.symbol,
            timeframe: key.timeframe,
            market_kind: key.market_kind,
            timestamp,
            engine_version_major: indicator_engine_major_version(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            symbol: self.symbol,
            timeframe: self.timeframe,
            market_kind: self.market_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_stamps_current_engine_version() {
        let key = SeriesKey::new("ETHUSDT", Timeframe::Hour1, MarketKind::Spot);
        let rec = IndicatorRecord::new(key, UnixSeconds(0));
        assert_eq!(rec.engine_version_major, indicator_engine_major_version());
        assert!(rec.rsi14.is_none());
    }
}
