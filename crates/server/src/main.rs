//! Market server - agricultural market intelligence backend
//!
//! Serves weekly commodity price forecasts, plant disease detection,
//! market data exports, the chat assistant and dashboard data.

use anyhow::Result;
use market_server::{api, config::ServerConfig, state::AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting market-server");

    let config = ServerConfig::load()?;
    info!(
        bind = %config.bind_addr(),
        model_dir = ?config.model_dir,
        dataset = ?config.dataset_path,
        "Server configured"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    state.register_health().await;
    state.health_registry.set_ready(true).await;

    state.logger.log_startup(
        SERVER_VERSION,
        &config.bind_addr(),
        state.forecaster.model_name(),
        state.classifier.name(),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };
    api::serve(&config.bind_addr(), state.clone(), shutdown).await?;

    state.logger.log_shutdown("SIGINT received");
    let stats = state.forecaster.stats();
    info!(
        forecasts = stats.forecasts,
        model_points = stats.model_points,
        fallback_points = stats.fallback_points,
        "Shutting down"
    );

    Ok(())
}
