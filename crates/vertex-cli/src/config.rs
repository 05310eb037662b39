//! The TOML config document loaded by both `serve` and `backtest` (spec.md §6): strategy
//! definitions, sizing presets and indicator metadata, matching
//! `nautilus-common::config`'s `derive(Deserialize)` + `Default` pattern.

use std::path::Path;

use serde::Deserialize;
use vertex_model::config::{IndicatorMetadata, SizingPresetDef, StrategyDefinition};

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub strategies: Vec<StrategyDefinition>,
    #[serde(default, rename = "position_presets")]
    pub sizing_presets: Vec<SizingPresetDef>,
    #[serde(default)]
    pub indicators: Vec<IndicatorMetadata>,
    #[serde(default)]
    pub bus: BusConfig,
}

#[derive(Debug, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
    #[serde(default = "default_retention_capacity")]
    pub retention_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { subscriber_capacity: default_subscriber_capacity(), retention_capacity: default_retention_capacity() }
    }
}

fn default_subscriber_capacity() -> usize {
    256
}

fn default_retention_capacity() -> usize {
    1_000
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("failed to read config at {}: {err}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|err| anyhow::anyhow!("failed to parse config at {}: {err}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for preset in &self.sizing_presets {
            preset.validate()?;
        }
        for indicator in &self.indicators {
            indicator.validate()?;
        }
        Ok(())
    }
}
