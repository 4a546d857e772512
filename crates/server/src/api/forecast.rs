use super::ApiError;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use market_lib::models::{CommodityPriceRange, WeeklyPredictionPoint};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub variety: Option<String>,
    /// Defaults to the configured horizon
    #[serde(default)]
    pub weeks: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub weekly_predictions: Vec<WeeklyPredictionPoint>,
}

#[derive(Debug, Serialize)]
pub struct CommodityInfo {
    pub name: String,
    #[serde(flatten)]
    pub range: CommodityPriceRange,
}

#[derive(Debug, Serialize)]
pub struct CommoditiesResponse {
    pub commodities: Vec<CommodityInfo>,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload?;
    let commodity = request
        .variety
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'variety' field".to_string()))?;
    let weeks = request
        .weeks
        .unwrap_or_else(|| state.forecaster.default_horizon());

    let start = Instant::now();
    let weekly_predictions = state
        .forecaster
        .generate_weekly_predictions(commodity, weeks)?;
    let elapsed = start.elapsed();

    state.metrics.observe_forecast_latency(elapsed.as_secs_f64());
    state.metrics.inc_forecasts_served();
    state.logger.log_forecast(
        commodity,
        weekly_predictions.len(),
        state.forecaster.model_name(),
        elapsed.as_millis(),
    );

    Ok(Json(PredictResponse { weekly_predictions }))
}

/// Catalogued commodities with their price bounds, sorted by name
pub async fn commodities(State(state): State<Arc<AppState>>) -> Json<CommoditiesResponse> {
    let commodities = state
        .forecaster
        .catalog()
        .iter()
        .map(|(name, range)| CommodityInfo {
            name: name.to_string(),
            range: *range,
        })
        .collect();
    Json(CommoditiesResponse { commodities })
}
