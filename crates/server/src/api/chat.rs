use super::ApiError;
use crate::state::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use market_lib::chat::{ChatReply, ChatRequest};
use std::sync::Arc;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload?;
    state.metrics.inc_chat_requests();
    Ok(Json(state.chat.respond(&request.message)))
}
