//! Hierarchical routing keys (spec.md §3, §6).

use std::fmt;

use serde::{Deserialize, Serialize};
use ustr::Ustr;

use crate::bar::{MarketKind, SeriesKey};

/// A hierarchical string key. Routing is exact-match only; the bus never interprets the
/// segments, it just compares `Ustr`s. Construction is centralized here so every producer and
/// consumer agrees on the exact format.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(pub Ustr);

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Topic {
    #[must_use]
    pub fn from_raw(raw: impl AsRef<str>) -> Self {
        Self(Ustr::from(raw.as_ref()))
    }

    #[must_use]
    pub fn bar(key: SeriesKey) -> Self {
        Self::from_raw(format!("bar.{}.{}.{}", key.symbol, key.timeframe, key.market_kind))
    }

    #[must_use]
    pub fn bar_tick(key: SeriesKey) -> Self {
        Self::from_raw(format!("bar.{}.{}.{}.tick", key.symbol, key.timeframe, key.market_kind))
    }

    #[must_use]
    pub fn indicator(key: SeriesKey) -> Self {
        Self::from_raw(format!("ind.{}.{}.{}", key.symbol, key.timeframe, key.market_kind))
    }

    #[must_use]
    pub fn signal(strategy: impl AsRef<str>, symbol: impl AsRef<str>) -> Self {
        Self::from_raw(format!("sig.{}.{}", strategy.as_ref(), symbol.as_ref()))
    }

    /// Matches the `sig.<strategy>.*` pattern the trading engine subscribes to internally
    /// (spec.md §4.9 step 2). The bus itself does no wildcard matching (spec.md §4.1); engines
    /// that want a family of topics subscribe to each concrete topic they expect, or, as here,
    /// filter by prefix client-side against [`Self::list_topics`].
    #[must_use]
    pub fn signal_prefix(strategy: impl AsRef<str>) -> String {
        format!("sig.{}.", strategy.as_ref())
    }

    #[must_use]
    pub fn status(node: impl AsRef<str>) -> Self {
        Self::from_raw(format!("status.{}", node.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::Timeframe;

    #[test]
    fn bar_topic_format() {
        let key = SeriesKey::new("BTCUSDT", Timeframe::Hour1, MarketKind::Spot);
        assert_eq!(Topic::bar(key).as_str(), "bar.BTCUSDT.hour1.spot");
        assert_eq!(Topic::indicator(key).as_str(), "ind.BTCUSDT.hour1.spot");
    }

    #[test]
    fn signal_topic_format() {
        assert_eq!(Topic::signal("dual_ma", "BTCUSDT").as_str(), "sig.dual_ma.BTCUSDT");
    }
}
