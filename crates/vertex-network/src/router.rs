//! Assembles the full `axum::Router` (spec.md §6): the `/ws` push channel, the backtest
//! submission/result/push endpoints, and the read-only HTTP surface.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::gateway::ws_handler;
use crate::http::{backtest, bars, indicators, listings, signals};
use crate::state::AppState;

#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/bars/{symbol}/{timeframe}", get(bars::get_bars))
        .route("/indicators/{symbol}/{timeframe}/latest", get(indicators::get_latest_indicator))
        .route("/signals/{strategy}", get(signals::get_signals))
        .route("/backtest/run", post(backtest::submit_backtest))
        .route("/backtest/result/{task_id}", get(backtest::get_backtest_result))
        .route("/backtest/{task_id}", get(backtest::backtest_ws_handler))
        .route("/strategies", get(listings::list_strategies))
        .route("/position-presets", get(listings::list_position_presets))
        .route("/indicators/metadata", get(listings::list_indicator_metadata))
        .route("/data/stats", get(listings::data_stats))
        .route("/status/{node}", get(listings::node_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
