//! `vertex serve`: constructs the bus, in-memory stores, task manager and strategy registry,
//! then runs the `vertex-network` HTTP/WS surface until interrupted (spec.md §6, §9).
//!
//! Wiring a real `ExchangeAdapter` (spec.md §4.4) — the one out-of-scope collaborator — is left
//! to a deployer; this command brings up everything the gateway needs on its own.

use std::sync::Arc;

use tokio::net::TcpListener;
use vertex_common::MessageBus;
use vertex_core::LiveClock;
use vertex_network::AppState;
use vertex_persistence::InMemoryStore;
use vertex_system::TaskManager;
use vertex_trading::StrategyRegistry;

use crate::config::AppConfig;
use crate::opt::ServeOpt;

pub async fn run(opt: ServeOpt) -> anyhow::Result<()> {
    let config = AppConfig::load(&opt.config)?;

    let bus = Arc::new(MessageBus::new(config.bus.subscriber_capacity, config.bus.retention_capacity));
    let store = Arc::new(InMemoryStore::new());
    let tasks = Arc::new(TaskManager::new(Arc::new(LiveClock)));
    tasks.spawn_cleanup_sweep(vertex_system::tasks::DEFAULT_CLEANUP_INTERVAL);

    let state = AppState {
        bus,
        bar_store: store.clone(),
        indicator_store: store.clone(),
        signal_store: store.clone(),
        backtest_store: store,
        tasks,
        strategies: Arc::new(StrategyRegistry::with_builtin_strategies()),
        strategy_defs: Arc::new(config.strategies),
        sizing_presets: Arc::new(config.sizing_presets),
        indicator_metadata: Arc::new(config.indicators),
    };

    let router = vertex_network::build_router(state);
    let listener = TcpListener::bind(&opt.bind).await?;
    tracing::info!(bind = %opt.bind, "vertex gateway listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
