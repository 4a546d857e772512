use super::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use market_lib::history::{ExportFormat, RecordFilter};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub state: Option<String>,
    pub district: Option<String>,
    pub commodity: Option<String>,
    pub format: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Filtered history as a CSV or JSON attachment
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format: ExportFormat = query.format.as_deref().unwrap_or_default().parse()?;
    let filter = RecordFilter {
        state: non_empty(query.state),
        district: non_empty(query.district),
        commodity: non_empty(query.commodity),
    };

    let records = state.history.filter(&filter);
    let body = format.render(&records)?;

    state.metrics.inc_exports();
    state.logger.log_export(format.as_str(), records.len());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", format.file_name()),
            ),
        ],
        body,
    ))
}
