//! Bars and the keys that address a bar series (spec.md §3).

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use ustr::Ustr;
use vertex_core::UnixSeconds;

/// The bar interval. Variants carry their duration in seconds so gap-fill and monotonicity
/// checks never hardcode a table of magic numbers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    /// Duration of one bar period, in seconds.
    #[must_use]
    pub fn duration_secs(self) -> i64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 5 * 60,
            Timeframe::Minute15 => 15 * 60,
            Timeframe::Hour1 => 60 * 60,
            Timeframe::Hour4 => 4 * 60 * 60,
            Timeframe::Day1 => 24 * 60 * 60,
        }
    }

    /// True if `ts` sits exactly on a period boundary for this timeframe.
    #[must_use]
    pub fn is_aligned(self, ts: UnixSeconds) -> bool {
        ts.0 % self.duration_secs() == 0
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    Spot,
    Perpetual,
}

/// The triple that identifies one bar series. Cheap to copy: `Ustr` interns the symbol string.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SeriesKey {
    pub symbol: Ustr,
    pub timeframe: Timeframe,
    pub market_kind: MarketKind,
}

impl SeriesKey {
    #[must_use]
    pub fn new(symbol: impl AsRef<str>, timeframe: Timeframe, market_kind: MarketKind) -> Self {
        Self {
            symbol: Ustr::from(symbol.as_ref()),
            timeframe,
            market_kind,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.symbol, self.timeframe, self.market_kind)
    }
}

/// One OHLCV record at a fixed interval (spec.md §3). Immutable once published.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Ustr,
    pub timeframe: Timeframe,
    pub market_kind: MarketKind,
    pub timestamp: UnixSeconds,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    #[must_use]
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            symbol: self.symbol,
            timeframe: self.timeframe,
            market_kind: self.market_kind,
        }
    }

    /// Checks the OHLC/volume invariants from spec.md §3 (`low <= open, close <= high`, `volume
    /// >= 0`). Does not check series monotonicity, which is a property of a *sequence* of bars,
    /// not a single one — see [`crate::bar::validate_sequence`].
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
            && self.volume >= 0.0
            && self.open >= 0.0
            && self.high >= 0.0
            && self.low >= 0.0
            && self.close >= 0.0
    }
}

/// Checks that `bars` are strictly increasing in timestamp, spaced by exactly one timeframe
/// period, as required for any single `(symbol, timeframe, market_kind)` key (spec.md §3, §8).
#[must_use]
pub fn validate_sequence(bars: &[Bar]) -> bool {
    bars.windows(2).all(|pair| {
        let [a, b] = pair else { return true };
        b.timestamp.0 - a.timestamp.0 == a.timeframe.duration_secs()
    })
}
