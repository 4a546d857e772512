//! Observability for the market service
//!
//! Provides:
//! - Prometheus metrics (forecast latency, fallbacks, per-feature request counters, model mode)
//! - Structured JSON event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, GaugeVec, Histogram, IntCounter,
};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

/// Histogram buckets for forecast latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MarketMetricsInner> = OnceLock::new();

struct MarketMetricsInner {
    forecast_latency_seconds: Histogram,
    forecasts_served: IntCounter,
    fallback_predictions: IntCounter,
    classifications: IntCounter,
    chat_requests: IntCounter,
    exports: IntCounter,
    login_failures: IntCounter,
    model_mode_info: GaugeVec,
    model_modes: Mutex<HashMap<String, (String, String)>>,
}

impl MarketMetricsInner {
    fn new() -> Self {
        Self {
            forecast_latency_seconds: register_histogram!(
                "market_forecast_latency_seconds",
                "Time spent producing a weekly price forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            forecasts_served: register_int_counter!(
                "market_forecasts_served_total",
                "Total number of weekly forecasts returned"
            )
            .expect("Failed to register forecasts_served"),

            fallback_predictions: register_int_counter!(
                "market_fallback_predictions_total",
                "Weekly points simulated because the price model failed"
            )
            .expect("Failed to register fallback_predictions"),

            classifications: register_int_counter!(
                "market_disease_classifications_total",
                "Total number of plant images classified"
            )
            .expect("Failed to register classifications"),

            chat_requests: register_int_counter!(
                "market_chat_requests_total",
                "Total number of chat messages answered"
            )
            .expect("Failed to register chat_requests"),

            exports: register_int_counter!(
                "market_exports_total",
                "Total number of market data downloads"
            )
            .expect("Failed to register exports"),

            login_failures: register_int_counter!(
                "market_login_failures_total",
                "Total number of rejected logins"
            )
            .expect("Failed to register login_failures"),

            model_mode_info: register_gauge_vec!(
                "market_model_mode_info",
                "Backend and version serving each model-backed feature",
                &["component", "backend", "version"]
            )
            .expect("Failed to register model_mode_info"),

            model_modes: Mutex::new(HashMap::new()),
        }
    }
}

/// Lightweight handle to the global metrics; clones share the same series
#[derive(Clone)]
pub struct MarketMetrics {
    _private: (),
}

impl Default for MarketMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MarketMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MarketMetricsInner {
        GLOBAL_METRICS.get_or_init(MarketMetricsInner::new)
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn inc_forecasts_served(&self) {
        self.inner().forecasts_served.inc();
    }

    pub fn inc_fallback_predictions(&self) {
        self.inner().fallback_predictions.inc();
    }

    pub fn inc_classifications(&self) {
        self.inner().classifications.inc();
    }

    pub fn inc_chat_requests(&self) {
        self.inner().chat_requests.inc();
    }

    pub fn inc_exports(&self) {
        self.inner().exports.inc();
    }

    pub fn inc_login_failures(&self) {
        self.inner().login_failures.inc();
    }

    /// Record which backend serves forecasts
    pub fn set_forecast_backend(&self, backend: &str, version: &str) {
        self.set_model_mode("forecaster", backend, version);
    }

    /// Record which backend serves disease classification
    pub fn set_classifier_backend(&self, backend: &str, version: &str) {
        self.set_model_mode("classifier", backend, version);
    }

    fn set_model_mode(&self, component: &str, backend: &str, version: &str) {
        let inner = self.inner();
        if let Ok(mut modes) = inner.model_modes.lock() {
            // One series per component
            if let Some((old_backend, old_version)) =
                modes.insert(component.to_string(), (backend.to_string(), version.to_string()))
            {
                if let Err(e) = inner
                    .model_mode_info
                    .remove_label_values(&[component, &old_backend, &old_version])
                {
                    debug!(component, error = %e, "No previous model mode series to remove");
                }
            }
        }
        inner
            .model_mode_info
            .with_label_values(&[component, backend, version])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Emits one consistently-named `event` field per significant action so log
/// pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, bind: &str, forecast_backend: &str, classifier: &str) {
        info!(
            event = "server_started",
            service = %self.service,
            version = %version,
            bind = %bind,
            forecast_backend = %forecast_backend,
            classifier = %classifier,
            "Market service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            service = %self.service,
            reason = %reason,
            "Market service shutting down"
        );
    }

    pub fn log_forecast(&self, commodity: &str, weeks: usize, model: &str, elapsed_ms: u128) {
        info!(
            event = "forecast_generated",
            service = %self.service,
            commodity = %commodity,
            weeks = weeks,
            model = %model,
            elapsed_ms = elapsed_ms as u64,
            "Generated weekly price forecast"
        );
    }

    pub fn log_model_fallback(&self, component: &str, reason: &str) {
        warn!(
            event = "model_fallback",
            service = %self.service,
            component = %component,
            reason = %reason,
            "Model unavailable, serving fallback results"
        );
    }

    pub fn log_model_loaded(&self, component: &str, backend: &str, version: &str) {
        info!(
            event = "model_loaded",
            service = %self.service,
            component = %component,
            backend = %backend,
            version = %version,
            "Model loaded"
        );
    }

    pub fn log_model_unavailable(&self, component: &str, error: &str) {
        warn!(
            event = "model_unavailable",
            service = %self.service,
            component = %component,
            error = %error,
            "Model could not be loaded"
        );
    }

    pub fn log_export(&self, format: &str, rows: usize) {
        info!(
            event = "data_exported",
            service = %self.service,
            format = %format,
            rows = rows,
            "Market data exported"
        );
    }

    pub fn log_signup(&self, username: &str) {
        info!(
            event = "user_signed_up",
            service = %self.service,
            username = %username,
            "User registered"
        );
    }

    pub fn log_login_failed(&self, username: &str) {
        warn!(
            event = "login_failed",
            service = %self.service,
            username = %username,
            "Rejected login attempt"
        );
    }
}
