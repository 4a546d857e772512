//! Application context shared by every handler

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use market_lib::{
    auth::{AuthService, InMemoryUserStore},
    catalog::PriceRangeCatalog,
    chat::ChatResponder,
    classifier::{self, DiseaseClassifier},
    forecast::{self, PriceForecaster},
    health::{components, HealthRegistry},
    history::MarketHistory,
    observability::{MarketMetrics, StructuredLogger},
};
use std::sync::Arc;
use tracing::info;

/// Read-only models and data plus the mutable account state
pub struct AppState {
    pub forecaster: PriceForecaster,
    pub classifier: Box<dyn DiseaseClassifier>,
    pub history: Arc<MarketHistory>,
    pub chat: ChatResponder,
    pub auth: AuthService,
    pub health_registry: HealthRegistry,
    pub metrics: MarketMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        forecaster: PriceForecaster,
        classifier: Box<dyn DiseaseClassifier>,
        history: Arc<MarketHistory>,
        auth: AuthService,
        logger: StructuredLogger,
    ) -> Self {
        let metrics = MarketMetrics::new();
        metrics.set_classifier_backend(classifier.name(), classifier.name());
        Self {
            forecaster,
            classifier,
            chat: ChatResponder::new(history.clone()),
            history,
            auth,
            health_registry: HealthRegistry::new(),
            metrics,
            logger,
        }
    }

    /// Load every artifact named by the config.
    ///
    /// Missing models and data degrade to simulation, demo mode or an empty
    /// dataset. Only an explicit `onnx` backend that fails to load, or an
    /// unreadable range override, aborts startup.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let logger = StructuredLogger::new(&config.service_name);

        let catalog = match &config.ranges_path {
            Some(path) => PriceRangeCatalog::load(path)?,
            None => PriceRangeCatalog::default(),
        };
        info!(commodities = catalog.len(), "Commodity price ranges ready");

        let loaded = forecast::load_forecast_model(config.forecast_backend, &config.forecast_artifacts())
            .context("Failed to initialize price forecaster")?;
        if loaded.model.is_simulated() {
            logger.log_model_fallback("forecaster", "price model unavailable or disabled");
        } else {
            logger.log_model_loaded("forecaster", loaded.model.name(), loaded.model.version());
        }
        let forecaster = PriceForecaster::new(Arc::new(catalog), loaded, config.forecast_config());

        let classifier = classifier::load_disease_classifier(&config.classifier_artifacts());
        if classifier.is_demo() {
            logger.log_model_unavailable("classifier", "disease model or class labels missing");
        } else {
            logger.log_model_loaded("classifier", classifier.name(), classifier.name());
        }

        let history = Arc::new(MarketHistory::load_or_empty(&config.dataset_path));

        Ok(Self::new(
            forecaster,
            classifier,
            history,
            AuthService::with_sessions(Arc::new(InMemoryUserStore::new()), config.session_store()),
            logger,
        ))
    }

    /// Publish component modes to the health registry
    pub async fn register_health(&self) {
        let registry = &self.health_registry;
        registry
            .register_mode(
                components::FORECASTER,
                self.forecaster
                    .is_simulated()
                    .then(|| "Price model unavailable, forecasts are simulated".to_string()),
            )
            .await;
        registry
            .register_mode(
                components::CLASSIFIER,
                self.classifier
                    .is_demo()
                    .then(|| "Disease model unavailable, serving demo diagnoses".to_string()),
            )
            .await;
        registry
            .register_mode(
                components::HISTORY,
                self.history
                    .is_empty()
                    .then(|| "No historical market data loaded".to_string()),
            )
            .await;
        registry.register(components::AUTH).await;
    }
}
