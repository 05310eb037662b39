//! Configuration surface documents (spec.md §6): strategy definitions with parameter schemas,
//! sizing presets, indicator metadata. Each has a `validate()` rejecting out-of-range values
//! before a task is accepted, per spec.md §7 kind 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vertex_core::{ErrorKind, VertexError};

/// Bounds and default for one strategy parameter, used to validate an untyped parameter
/// document submitted at the gateway boundary (spec.md §9 design note on dynamic parameter
/// dictionaries).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamSchema {
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamSchema {
    #[must_use]
    pub fn validate(&self, value: f64) -> Result<(), VertexError> {
        if !value.is_finite() {
            return Err(VertexError::validation("parameter value must be finite"));
        }
        if value < self.min || value > self.max {
            return Err(VertexError::validation(format!(
                "parameter {value} out of range [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub name: String,
    pub description: String,
    pub params: BTreeMap<String, ParamSchema>,
}

impl StrategyDefinition {
    /// Validates a parameter document (e.g. from `POST /backtest/run`) against this
    /// definition's schema: every supplied key must exist and be in range, and every
    /// required key without a default supplied must be present.
    pub fn validate_params(&self, supplied: &BTreeMap<String, f64>) -> Result<(), VertexError> {
        for (key, value) in supplied {
            let schema = self.params.get(key).ok_or_else(|| {
                VertexError::validation(format!("unknown parameter '{key}' for strategy '{}'", self.name))
            })?;
            schema.validate(*value)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn resolve(&self, supplied: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut resolved: BTreeMap<String, f64> =
            self.params.iter().map(|(k, v)| (k.clone(), v.default)).collect();
        resolved.extend(supplied.clone());
        resolved
    }
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingKind {
    FixedAmount,
    FixedPercentage,
    RiskBased,
    Kelly,
    VolatilityAdjusted,
}

/// Risk limits and sizing rule bundled as a named preset (spec.md §3, §4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SizingPresetDef {
    pub name: String,
    pub sizing_kind: SizingKind,
    /// Fixed amount (`FixedAmount`), fraction (`FixedPercentage`/`RiskBased`), base percentage
    /// (`VolatilityAdjusted`), or win rate (`Kelly`) — interpretation depends on `sizing_kind`.
    pub primary_param: f64,
    /// Payoff ratio `b`, only used by `Kelly`.
    pub secondary_param: f64,
    pub max_positions: usize,
    pub max_total_exposure_fraction: f64,
    pub single_position_max_fraction: f64,
}

impl SizingPresetDef {
    pub fn validate(&self) -> Result<(), VertexError> {
        if self.max_positions == 0 {
            return Err(VertexError::validation("max_positions must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.max_total_exposure_fraction) {
            return Err(VertexError::validation("max_total_exposure_fraction must be in [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.single_position_max_fraction) {
            return Err(VertexError::validation("single_position_max_fraction must be in [0,1]"));
        }
        Ok(())
    }
}

/// Period, warm-up and any extra parameters for one indicator, consumed by
/// `vertex-indicators::CalculatorSet::from_metadata`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub name: String,
    pub period: usize,
    pub warmup: usize,
    pub extra: BTreeMap<String, f64>,
}

impl IndicatorMetadata {
    pub fn validate(&self) -> Result<(), VertexError> {
        if self.period == 0 {
            return Err(VertexError::validation(format!("indicator '{}': period must be > 0", self.name)));
        }
        Ok(())
    }
}

impl From<VertexError> for crate::ConfigError {
    fn from(e: VertexError) -> Self {
        crate::ConfigError { kind: e.kind, message: e.message }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ConfigError {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParamSchema {
        ParamSchema { default: 14.0, min: 2.0, max: 100.0, step: 1.0 }
    }

    #[test]
    fn param_schema_rejects_out_of_range() {
        assert!(schema().validate(150.0).is_err());
        assert!(schema().validate(1.0).is_err());
        assert!(schema().validate(14.0).is_ok());
    }

    #[test]
    fn param_schema_rejects_non_finite() {
        assert!(schema().validate(f64::NAN).is_err());
        assert!(schema().validate(f64::INFINITY).is_err());
    }

    #[test]
    fn strategy_definition_resolves_defaults_with_overrides() {
        let mut params = BTreeMap::new();
        params.insert("rsi_period".to_string(), schema());
        let def = StrategyDefinition { name: "rsi_mr".into(), description: String::new(), params };

        let mut supplied = BTreeMap::new();
        supplied.insert("rsi_period".to_string(), 21.0);
        assert!(def.validate_params(&supplied).is_ok());

        let resolved = def.resolve(&supplied);
        assert_eq!(resolved["rsi_period"], 21.0);
    }

    #[test]
    fn strategy_definition_rejects_unknown_param() {
        let def = StrategyDefinition { name: "rsi_mr".into(), description: String::new(), params: BTreeMap::new() };
        let mut supplied = BTreeMap::new();
        supplied.insert("nope".to_string(), 1.0);
        assert!(def.validate_params(&supplied).is_err());
    }

    #[test]
    fn sizing_preset_validates_fractions() {
        let mut preset = SizingPresetDef {
            name: "default".into(),
            sizing_kind: SizingKind::RiskBased,
            primary_param: 0.02,
            secondary_param: 0.0,
            max_positions: 5,
            max_total_exposure_fraction: 0.8,
            single_position_max_fraction: 0.25,
        };
        assert!(preset.validate().is_ok());
        preset.max_total_exposure_fraction = 1.5;
        assert!(preset.validate().is_err());
    }
}
