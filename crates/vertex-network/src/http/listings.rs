//! Read-only listing endpoints (spec.md §6): strategies, position presets, indicator metadata,
//! data statistics, and per-node status (covers both "download tasks" and "data-repair status",
//! since both are reported the same way — a node publishing onto its own `status.<node>` topic,
//! spec.md §4.2's consecutive-error escalation path — rather than through the task manager,
//! which only tracks backtests).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use vertex_model::config::{IndicatorMetadata, SizingPresetDef, StrategyDefinition};
use vertex_model::Topic;

use crate::state::AppState;

pub async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategyDefinition>> {
    Json(state.strategy_defs.as_ref().clone())
}

pub async fn list_position_presets(State(state): State<AppState>) -> Json<Vec<SizingPresetDef>> {
    Json(state.sizing_presets.as_ref().clone())
}

pub async fn list_indicator_metadata(State(state): State<AppState>) -> Json<Vec<IndicatorMetadata>> {
    Json(state.indicator_metadata.as_ref().clone())
}

#[derive(Serialize)]
pub struct TopicStat {
    pub topic: String,
    pub retained: usize,
}

pub async fn data_stats(State(state): State<AppState>) -> Json<Vec<TopicStat>> {
    let stats = state
        .bus
        .list_topics()
        .into_iter()
        .map(|topic| TopicStat { topic: topic.as_str().to_string(), retained: state.bus.stream_len(topic) })
        .collect();
    Json(stats)
}

#[derive(Deserialize)]
pub struct TailQuery {
    pub n: Option<usize>,
}

#[derive(Serialize)]
pub struct StatusEntry {
    pub stream_id: u64,
    pub status: serde_json::Value,
}

/// Tails a node's `status.<node>` retention stream — used for both the download-task and
/// data-repair-status listing endpoints named in spec.md §6.
pub async fn node_status(
    Path(node): Path<String>,
    Query(query): Query<TailQuery>,
    State(state): State<AppState>,
) -> Json<Vec<StatusEntry>> {
    let n = query.n.unwrap_or(20);
    let entries = state
        .bus
        .stream_tail(Topic::status(&node), n)
        .into_iter()
        .map(|(stream_id, payload)| StatusEntry {
            stream_id,
            status: serde_json::from_slice(&payload).unwrap_or(serde_json::Value::Null),
        })
        .collect();
    Json(entries)
}
