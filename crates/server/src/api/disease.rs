use super::ApiError;
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use market_lib::models::Diagnosis;
use std::sync::Arc;
use tracing::debug;

/// Multipart field carrying the leaf image
const FILE_FIELD: &str = "file";

pub async fn detect_disease(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Diagnosis>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::BadRequest("No file uploaded".to_string()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, bytes));
        break;
    }
    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    debug!(file = %file_name, bytes = bytes.len(), "Classifying uploaded image");

    // Decoding and inference are CPU bound
    let worker = state.clone();
    let diagnosis = tokio::task::spawn_blocking(move || worker.classifier.classify(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("Classification task failed: {}", e)))??;

    state.metrics.inc_classifications();
    Ok(Json(diagnosis))
}
