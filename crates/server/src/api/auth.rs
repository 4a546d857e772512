use super::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use market_lib::auth::{LoginRequest, SignupRequest};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    pub token: String,
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let username = request.username.trim().to_string();
    state.auth.signup(request).await?;
    state.logger.log_signup(&username);

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let session = match state.auth.login(&request).await {
        Ok(session) => session,
        Err(e) => {
            state.metrics.inc_login_failures();
            state.logger.log_login_failed(request.username.trim());
            return Err(e.into());
        }
    };

    let cookie = format!("{}={}; HttpOnly; Path=/", SESSION_COOKIE, session.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Login successful".to_string(),
            username: session.username,
            token: session.token,
        }),
    ))
}

/// Ends the session named by a bearer token or the session cookie
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.auth.logout(&token);
    }
    let expired = format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE);
    (
        [(header::SET_COOKIE, expired)],
        Json(json!({"message": "Logged out successfully"})),
    )
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
