//! `GET /bars/:symbol/:timeframe` (spec.md §6).

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vertex_core::{UnixSeconds, VertexError};
use vertex_model::{Bar, MarketKind, SeriesKey, Timeframe};
use vertex_persistence::BarStore;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RangeQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub market_kind: Option<String>,
}

pub async fn get_bars(
    Path((symbol, timeframe)): Path<(String, String)>,
    Query(range): Query<RangeQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Bar>>, ApiError> {
    let key = parse_series_key(&symbol, &timeframe, range.market_kind.as_deref())?;
    let from = UnixSeconds(range.from.unwrap_or(0));
    let to = UnixSeconds(range.to.unwrap_or(i64::MAX));
    let bars = state.bar_store.range(key, from, to).await?;
    Ok(Json(bars))
}

pub(crate) fn parse_series_key(symbol: &str, timeframe: &str, market_kind: Option<&str>) -> Result<SeriesKey, ApiError> {
    let timeframe = Timeframe::from_str(timeframe)
        .map_err(|_| VertexError::validation(format!("unknown timeframe '{timeframe}'")))?;
    let market_kind = match market_kind {
        Some(raw) => MarketKind::from_str(raw).map_err(|_| VertexError::validation(format!("unknown market_kind '{raw}'")))?,
        None => MarketKind::Spot,
    };
    Ok(SeriesKey::new(symbol, timeframe, market_kind))
}
