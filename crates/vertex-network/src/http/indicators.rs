//! `GET /indicators/:symbol/:timeframe/latest` (spec.md §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vertex_model::IndicatorRecord;
use vertex_persistence::IndicatorStore;

use super::bars::parse_series_key;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MarketKindQuery {
    pub market_kind: Option<String>,
}

pub async fn get_latest_indicator(
    Path((symbol, timeframe)): Path<(String, String)>,
    Query(query): Query<MarketKindQuery>,
    State(state): State<AppState>,
) -> Result<Json<Option<IndicatorRecord>>, ApiError> {
    let key = parse_series_key(&symbol, &timeframe, query.market_kind.as_deref())?;
    let record = state.indicator_store.latest(key).await?;
    Ok(Json(record))
}
