use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use market_lib::dashboard::{self, DashboardData, DashboardOptions};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub commodity: Option<String>,
    pub district: Option<String>,
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DashboardQuery>,
) -> Json<DashboardData> {
    Json(dashboard::build(
        &state.history,
        query.commodity.as_deref(),
        query.district.as_deref(),
    ))
}

pub async fn options(State(state): State<Arc<AppState>>) -> Json<DashboardOptions> {
    Json(dashboard::options(&state.history))
}
