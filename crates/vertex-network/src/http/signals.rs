//! `GET /signals/:strategy` (spec.md §6): recent signals filtered by symbol.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use ustr::Ustr;
use vertex_core::{UnixSeconds, VertexError};
use vertex_model::Signal;
use vertex_persistence::SignalStore;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignalsQuery {
    pub symbol: String,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

pub async fn get_signals(
    Path(strategy): Path<String>,
    Query(query): Query<SignalsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Signal>>, ApiError> {
    if query.symbol.trim().is_empty() {
        return Err(VertexError::validation("symbol query parameter is required").into());
    }
    let from = UnixSeconds(query.from.unwrap_or(0));
    let to = UnixSeconds(query.to.unwrap_or(i64::MAX));
    let signals = state
        .signal_store
        .range(Ustr::from(strategy.as_str()), Ustr::from(query.symbol.as_str()), from, to)
        .await?;
    Ok(Json(signals))
}
