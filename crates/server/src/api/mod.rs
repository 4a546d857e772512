//! HTTP API: forecasts, disease detection, accounts, market data, health

mod auth;
mod chat;
mod dashboard;
mod disease;
pub mod error;
mod export;
mod forecast;
mod health;

pub use error::ApiError;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Largest accepted leaf image upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/predict", post(forecast::predict))
        .route("/api/commodities", get(forecast::commodities))
        .route(
            "/api/detect_disease",
            post(disease::detect_disease).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/signup", post(auth::signup))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/download", get(export::download))
        .route("/api/chat", post(chat::chat))
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/dashboard/options", get(dashboard::options))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
