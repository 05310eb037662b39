//! Maps a validated strategy name + parameter document to a constructed strategy instance
//! (spec.md §4.6, closed-family/tagged-variant design note — the set of strategies is fixed at
//! compile time, so a `match` over a small factory table stands in for a plugin registry).

use std::collections::{BTreeMap, HashMap};

use vertex_core::{ErrorKind, VertexError};

use super::{DualMaCrossStrategy, RsiMeanReversionStrategy, Strategy};

type Factory = fn(&BTreeMap<String, f64>) -> Box<dyn Strategy>;

pub struct StrategyRegistry {
    factories: HashMap<&'static str, Factory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtin_strategies()
    }
}

impl StrategyRegistry {
    #[must_use]
    pub fn with_builtin_strategies() -> Self {
        let mut factories: HashMap<&'static str, Factory> = HashMap::new();
        factories.insert("dual_ma_cross", build_dual_ma_cross);
        factories.insert("rsi_mean_reversion", build_rsi_mean_reversion);
        Self { factories }
    }

    /// # Errors
    ///
    /// Returns a validation error if `name` has no registered factory.
    pub fn build(&self, name: &str, params: &BTreeMap<String, f64>) -> Result<Box<dyn Strategy>, VertexError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| VertexError::new(ErrorKind::Validation, format!("unknown strategy '{name}'")))?;
        Ok(factory(params))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn build_dual_ma_cross(_params: &BTreeMap<String, f64>) -> Box<dyn Strategy> {
    Box::new(DualMaCrossStrategy::new("dual_ma_cross"))
}

fn build_rsi_mean_reversion(params: &BTreeMap<String, f64>) -> Box<dyn Strategy> {
    let oversold = params.get("rsi_oversold").copied().unwrap_or(30.0);
    let overbought = params.get("rsi_overbought").copied().unwrap_or(70.0);
    Box::new(RsiMeanReversionStrategy::new("rsi_mean_reversion", oversold, overbought))
}
