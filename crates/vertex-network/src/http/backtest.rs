//! `POST /backtest/run`, `GET /backtest/result/:task_id`, `WS /backtest/:task_id` (spec.md §6).
//!
//! A submitted run resolves its strategy/preset/series key, builds a [`TradingEngine`] over a
//! [`ReplayDataSource`], and hands the whole run to [`vertex_system::TaskManager::submit`] so its
//! lifecycle (pending/running/completed, progress, cancellation) is identical to any other task.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use futures_util::SinkExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ustr::Ustr;
use uuid::Uuid;
use vertex_core::{TaskId, UnixSeconds, VertexError};
use vertex_data::ReplayDataSource;
use vertex_model::config::SizingKind;
use vertex_system::{ProgressTracker, TaskKind, TradingEngine};
use vertex_trading::{PositionManager, SizingPreset, SizingStrategy};

use super::bars::parse_series_key;
use crate::error::ApiError;
use crate::protocol::TaskPushFrame;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BacktestRequest {
    pub strategy: String,
    pub symbol: String,
    pub timeframe: String,
    pub start_date: i64,
    pub end_date: i64,
    pub initial_balance: f64,
    pub position_preset: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
    pub market_kind: Option<String>,
}

#[derive(Serialize)]
pub struct BacktestSubmitted {
    pub task_id: Uuid,
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

pub async fn submit_backtest(
    State(state): State<AppState>,
    Json(request): Json<BacktestRequest>,
) -> Result<Json<BacktestSubmitted>, ApiError> {
    let strategy_def = state
        .strategy_defs
        .iter()
        .find(|def| def.name == request.strategy)
        .ok_or_else(|| VertexError::validation(format!("unknown strategy '{}'", request.strategy)))?;
    strategy_def.validate_params(&request.params)?;
    let resolved_params = strategy_def.resolve(&request.params);

    let preset_def = state
        .sizing_presets
        .iter()
        .find(|def| def.name == request.position_preset)
        .ok_or_else(|| VertexError::validation(format!("unknown position preset '{}'", request.position_preset)))?;
    preset_def.validate()?;

    if request.initial_balance <= 0.0 || !request.initial_balance.is_finite() {
        return Err(VertexError::validation("initial_balance must be a positive finite number").into());
    }
    if request.end_date < request.start_date {
        return Err(VertexError::validation("end_date must not precede start_date").into());
    }

    let key = parse_series_key(&request.symbol, &request.timeframe, request.market_kind.as_deref())?;
    let strategy = state.strategies.build(&request.strategy, &resolved_params)?;

    let preset = SizingPreset {
        strategy: sizing_strategy_from(preset_def),
        max_positions: preset_def.max_positions,
        max_total_exposure_fraction: preset_def.max_total_exposure_fraction,
        single_position_max_fraction: preset_def.single_position_max_fraction,
    };
    let initial_balance = Decimal::from_f64_retain(request.initial_balance)
        .ok_or_else(|| VertexError::validation("initial_balance could not be represented exactly"))?;
    let positions = PositionManager::new(initial_balance, preset);

    let start = UnixSeconds(request.start_date);
    let end = UnixSeconds(request.end_date);
    let source =
        ReplayDataSource::load(state.bar_store.as_ref(), state.indicator_store.as_ref(), &[key], start, end).await?;

    let task_id = TaskId::new();
    let task_manager = state.tasks.clone();
    let tasks_for_progress = task_manager.clone();
    let bus = state.bus.clone();
    let backtest_store = state.backtest_store.clone();

    task_manager.submit(task_id, TaskKind::Backtest, move |cancel| async move {
        let total_points = source.total_points();
        let engine = TradingEngine::new(Ustr::from(request.strategy.as_str()), strategy, positions, Box::new(source), bus, vec![key], true);
        let tracker = ProgressTracker::new(total_points, std::time::Duration::from_millis(250), 100, move |pct| {
            tasks_for_progress.update_progress(task_id, pct);
        });
        let result = engine.run(Some(tracker), Some(cancel)).await;
        backtest_store.save(task_id, result.clone()).await?;
        serde_json::to_value(&result).map_err(|err| VertexError::new(vertex_core::ErrorKind::Fatal, err.to_string()))
    });

    Ok(Json(BacktestSubmitted { task_id: task_id.0 }))
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    Uuid::from_str(raw).map(TaskId).map_err(|_| VertexError::validation("malformed task id").into())
}

#[derive(Serialize)]
pub struct BacktestResultResponse {
    pub status: vertex_system::TaskStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn get_backtest_result(
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BacktestResultResponse>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let record = state
        .tasks
        .record(task_id)
        .ok_or_else(|| VertexError::new(vertex_core::ErrorKind::Cancelled, "unknown or expired task id"))?;
    Ok(Json(BacktestResultResponse { status: record.status, progress: record.progress, results: record.result, error: record.error }))
}

pub async fn backtest_ws_handler(ws: WebSocketUpgrade, Path(task_id): Path<String>, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| push_task_events(socket, task_id, state))
}

/// Opens a push channel that emits `{status, progress, results?, error?}` at each state
/// transition and progress update, then closes (spec.md §6, §8 scenario 6).
async fn push_task_events(mut socket: WebSocket, raw_task_id: String, state: AppState) {
    let Ok(task_id) = Uuid::from_str(&raw_task_id).map(TaskId) else {
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    if state.tasks.subscribe(task_id, tx).is_err() {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(event) = rx.recv().await {
        let terminal = matches!(&event, vertex_system::TaskEvent::Status { status, .. } if status.is_terminal());
        let frame = TaskPushFrame::from(event);
        let Ok(text) = serde_json::to_string(&frame) else { continue };
        if socket.send(Message::Text(text.into())).await.is_err() {
            return;
        }
        if terminal {
            break;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}
