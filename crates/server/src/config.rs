//! Server configuration
//!
//! Read from an optional file named by `MARKET_CONFIG` (format picked from the
//! extension), then overridden by `MARKET_*` environment variables.

use anyhow::{Context, Result};
use market_lib::auth::SessionStore;
use market_lib::classifier::{ClassifierArtifacts, ImageLayout};
use market_lib::forecast::{ForecastArtifacts, ForecastConfig, ModelBackend};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional config file
pub const CONFIG_FILE_ENV: &str = "MARKET_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding model artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Historical market arrivals CSV
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Optional JSON file replacing the built-in commodity price ranges
    #[serde(default)]
    pub ranges_path: Option<PathBuf>,

    #[serde(default)]
    pub forecast_backend: ModelBackend,

    #[serde(default = "default_horizon")]
    pub forecast_horizon_weeks: usize,

    #[serde(default = "default_max_horizon")]
    pub max_horizon_weeks: usize,

    #[serde(default = "default_price_model_file")]
    pub price_model_file: String,

    #[serde(default = "default_column_order_file")]
    pub column_order_file: String,

    #[serde(default)]
    pub price_model_sha256: Option<String>,

    #[serde(default = "default_disease_model_file")]
    pub disease_model_file: String,

    #[serde(default = "default_class_labels_file")]
    pub class_labels_file: String,

    #[serde(default)]
    pub disease_model_sha256: Option<String>,

    #[serde(default)]
    pub image_layout: ImageLayout,

    /// Lifetime of a login session
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_service_name() -> String {
    "market-server".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/market_history.csv")
}

fn default_horizon() -> usize {
    market_lib::forecast::DEFAULT_HORIZON_WEEKS
}

fn default_max_horizon() -> usize {
    market_lib::forecast::MAX_HORIZON_WEEKS
}

fn default_price_model_file() -> String {
    "price_model.onnx".to_string()
}

fn default_column_order_file() -> String {
    "column_order.json".to_string()
}

fn default_disease_model_file() -> String {
    "disease_model.onnx".to_string()
}

fn default_class_labels_file() -> String {
    "classes.txt".to_string()
}

fn default_session_ttl_secs() -> u64 {
    market_lib::auth::DEFAULT_SESSION_TTL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            bind: default_bind(),
            port: default_port(),
            model_dir: default_model_dir(),
            dataset_path: default_dataset_path(),
            ranges_path: None,
            forecast_backend: ModelBackend::default(),
            forecast_horizon_weeks: default_horizon(),
            max_horizon_weeks: default_max_horizon(),
            price_model_file: default_price_model_file(),
            column_order_file: default_column_order_file(),
            price_model_sha256: None,
            disease_model_file: default_disease_model_file(),
            class_labels_file: default_class_labels_file(),
            disease_model_sha256: None,
            image_layout: ImageLayout::default(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("MARKET").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: ServerConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_horizon_weeks == 0 {
            anyhow::bail!("max_horizon_weeks must be at least 1");
        }
        if self.forecast_horizon_weeks == 0 || self.forecast_horizon_weeks > self.max_horizon_weeks {
            anyhow::bail!(
                "forecast_horizon_weeks must be between 1 and {}, got {}",
                self.max_horizon_weeks,
                self.forecast_horizon_weeks
            );
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > i64::MAX as u64 / 1000 {
            anyhow::bail!("session_ttl_secs out of range: {}", self.session_ttl_secs);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn forecast_artifacts(&self) -> ForecastArtifacts {
        ForecastArtifacts {
            model_path: self.model_dir.join(&self.price_model_file),
            column_order_path: self.model_dir.join(&self.column_order_file),
            model_sha256: self.price_model_sha256.clone(),
        }
    }

    pub fn classifier_artifacts(&self) -> ClassifierArtifacts {
        ClassifierArtifacts {
            model_path: self.model_dir.join(&self.disease_model_file),
            labels_path: self.model_dir.join(&self.class_labels_file),
            model_sha256: self.disease_model_sha256.clone(),
            layout: self.image_layout,
        }
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::with_ttl(chrono::Duration::seconds(self.session_ttl_secs as i64))
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            default_horizon_weeks: self.forecast_horizon_weeks,
            max_horizon_weeks: self.max_horizon_weeks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.forecast_backend, ModelBackend::Auto);
        assert_eq!(
            config.forecast_artifacts().model_path,
            PathBuf::from("models/price_model.onnx")
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(
            &path,
            "port = 8081\nforecast_backend = \"simulated\"\nmodel_dir = \"/srv/models\"\nimage_layout = \"nchw\"\n",
        )
        .unwrap();

        let config = ServerConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.forecast_backend, ModelBackend::Simulated);
        assert_eq!(config.image_layout, ImageLayout::Nchw);
        assert_eq!(
            config.classifier_artifacts().labels_path,
            PathBuf::from("/srv/models/classes.txt")
        );
        assert_eq!(config.forecast_horizon_weeks, 5);
        assert_eq!(config.session_ttl_secs, 86_400);
    }

    #[test]
    fn test_session_ttl_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(&path, "session_ttl_secs = 0\n").unwrap();
        assert!(ServerConfig::load_from(Some(&path)).is_err());

        std::fs::write(&path, "session_ttl_secs = 600\n").unwrap();
        let config = ServerConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.session_ttl_secs, 600);
        assert!(config.session_store().is_empty());
    }

    #[test]
    fn test_rejects_bad_horizon() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("market.json");
        std::fs::write(&path, r#"{"forecast_horizon_weeks": 60}"#).unwrap();
        assert!(ServerConfig::load_from(Some(&path)).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ServerConfig::load_from(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
