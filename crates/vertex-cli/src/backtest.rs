//! `vertex backtest`: a one-shot replay run driven straight from the CLI, without going through
//! the gateway's `TaskManager` (spec.md §6, §9).

use std::collections::BTreeMap;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use ustr::Ustr;
use vertex_common::MessageBus;
use vertex_core::{UnixSeconds, VertexError};
use vertex_data::ReplayDataSource;
use vertex_model::config::SizingKind;
use vertex_model::{Bar, MarketKind, SeriesKey, Timeframe};
use vertex_persistence::{BarStore, InMemoryStore};
use vertex_system::TradingEngine;
use vertex_trading::{PositionManager, SizingPreset, SizingStrategy};

use crate::config::AppConfig;
use crate::opt::BacktestOpt;

pub async fn run(opt: BacktestOpt) -> anyhow::Result<()> {
    let config = AppConfig::load(&opt.config)?;

    let strategy_def = config
        .strategies
        .iter()
        .find(|def| def.name == opt.strategy)
        .ok_or_else(|| anyhow::anyhow!("unknown strategy '{}' in config", opt.strategy))?;
    let params: BTreeMap<String, f64> = opt.params.iter().cloned().collect();
    strategy_def.validate_params(&params)?;
    let resolved_params = strategy_def.resolve(&params);

    let preset_def = config
        .sizing_presets
        .iter()
        .find(|def| def.name == opt.position_preset)
        .ok_or_else(|| anyhow::anyhow!("unknown position preset '{}' in config", opt.position_preset))?;
    preset_def.validate()?;

    let timeframe = Timeframe::from_str(&opt.timeframe)
        .map_err(|_| anyhow::anyhow!("unknown timeframe '{}'", opt.timeframe))?;
    let market_kind = match opt.market_kind.as_deref() {
        Some(raw) => MarketKind::from_str(raw).map_err(|_| anyhow::anyhow!("unknown market_kind '{raw}'"))?,
        None => MarketKind::Spot,
    };
    let key = SeriesKey::new(&opt.symbol, timeframe, market_kind);

    let store = InMemoryStore::new();
    load_bars(&store, &opt.bars).await?;

    let strategies = vertex_trading::StrategyRegistry::with_builtin_strategies();
    let strategy = strategies.build(&opt.strategy, &resolved_params)?;

    let preset = SizingPreset {
        strategy: sizing_strategy_from(preset_def),
        max_positions: preset_def.max_positions,
        max_total_exposure_fraction: preset_def.max_total_exposure_fraction,
        single_position_max_fraction: preset_def.single_position_max_fraction,
    };
    let initial_balance = Decimal::from_f64_retain(opt.initial_balance)
        .ok_or_else(|| anyhow::anyhow!("initial_balance could not be represented exactly"))?;
    let positions = PositionManager::new(initial_balance, preset);

    let start = UnixSeconds(opt.start);
    let end = UnixSeconds(opt.end);
    let source = ReplayDataSource::load(&store, &store, &[key], start, end).await?;

    let bus = Arc::new(MessageBus::new(config.bus.subscriber_capacity, config.bus.retention_capacity));
    let engine = TradingEngine::new(Ustr::from(opt.strategy.as_str()), strategy, positions, Box::new(source), bus, vec![key], true);

    let result = engine.run::<fn(f64)>(None, None).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn sizing_strategy_from(def: &vertex_model::config::SizingPresetDef) -> SizingStrategy {
    match def.sizing_kind {
        SizingKind::FixedAmount => SizingStrategy::FixedAmount { amount: def.primary_param },
        SizingKind::FixedPercentage => SizingStrategy::FixedPercentage { fraction: def.primary_param },
        SizingKind::RiskBased => SizingStrategy::RiskBased { risk_fraction: def.primary_param },
        SizingKind::Kelly => SizingStrategy::Kelly { win_rate: def.primary_param, payoff_ratio: def.secondary_param },
        SizingKind::VolatilityAdjusted => SizingStrategy::VolatilityAdjusted { base_pct: def.primary_param },
    }
}

/// Seeds the replay `BarStore` from a JSON-lines file, one `Bar` per line.
async fn load_bars(store: &InMemoryStore, path: &std::path::Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(path)
        .map_err(|err| anyhow::anyhow!("failed to open bars file at {}: {err}", path.display()))?;
    for line in std::io::BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let bar: Bar = serde_json::from_str(&line)
            .map_err(|err| anyhow::anyhow!("malformed bar record: {err}"))?;
        store.persist(bar).await.map_err(VertexError::from)?;
    }
    Ok(())
}
