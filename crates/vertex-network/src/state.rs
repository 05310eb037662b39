//! Shared application context handed to every HTTP and WS handler (spec.md §6, §9: "treat each
//! as a process-wide context constructed at startup and passed explicitly").

use std::sync::Arc;

use vertex_common::MessageBus;
use vertex_model::config::{IndicatorMetadata, SizingPresetDef, StrategyDefinition};
use vertex_persistence::{BacktestResultStore, BarStore, IndicatorStore, SignalStore};
use vertex_system::TaskManager;
use vertex_trading::StrategyRegistry;

/// Everything a gateway handler needs, grouped by concern so a given endpoint only reads the
/// fields it touches. Cloning is cheap: every field is already `Arc`-shared.
#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<MessageBus>,
    pub bar_store: Arc<dyn BarStore>,
    pub indicator_store: Arc<dyn IndicatorStore>,
    pub signal_store: Arc<dyn SignalStore>,
    pub backtest_store: Arc<dyn BacktestResultStore>,
    pub tasks: Arc<TaskManager>,
    pub strategies: Arc<StrategyRegistry>,
    pub strategy_defs: Arc<Vec<StrategyDefinition>>,
    pub sizing_presets: Arc<Vec<SizingPresetDef>>,
    pub indicator_metadata: Arc<Vec<IndicatorMetadata>>,
}
