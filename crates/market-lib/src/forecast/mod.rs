//! Weekly commodity price forecasting

mod engine;
mod features;
mod inference;

pub use engine::{
    ForecastConfig, ForecastError, ForecastStats, PriceForecaster, DEFAULT_HORIZON_WEEKS,
    MAX_HORIZON_WEEKS,
};
pub use features::{
    FeatureAssembler, FeatureColumnOrder, FeatureRow, COMMODITY_PREFIX, DAY_COLUMN,
    MAX_PRICE_COLUMN, MIN_PRICE_COLUMN, MONTH_COLUMN, YEAR_COLUMN,
};
pub use inference::{OnnxForecastModel, SimulatedModel};

use anyhow::Result;
use rand::RngCore;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Trait for price regression backends
pub trait ForecastModel: Send + Sync {
    /// Predict the modal price for a single assembled row
    fn predict(&self, row: &FeatureRow, rng: &mut dyn RngCore) -> Result<f64>;

    /// Short backend name
    fn name(&self) -> &str;

    /// Version string of the loaded artifact
    fn version(&self) -> &str;

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Which regression backend to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// ONNX when the artifacts load, simulation otherwise
    #[default]
    Auto,
    /// ONNX only; failing to load is a startup error
    Onnx,
    /// Always simulate
    Simulated,
}

/// Locations of the persisted regression artifacts
#[derive(Debug, Clone)]
pub struct ForecastArtifacts {
    pub model_path: PathBuf,
    pub column_order_path: PathBuf,
    pub model_sha256: Option<String>,
}

/// A model selected at startup together with its column layout
pub struct LoadedForecastModel {
    pub model: Box<dyn ForecastModel>,
    pub columns: FeatureColumnOrder,
}

/// Select and load the regression backend
pub fn load_forecast_model(
    backend: ModelBackend,
    artifacts: &ForecastArtifacts,
) -> Result<LoadedForecastModel> {
    match backend {
        ModelBackend::Simulated => {
            info!("Price forecasting configured for simulation");
            Ok(simulated(artifacts))
        }
        ModelBackend::Onnx => load_onnx(artifacts),
        ModelBackend::Auto => match load_onnx(artifacts) {
            Ok(loaded) => Ok(loaded),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Price model unavailable, predictions will be simulated");
                Ok(simulated(artifacts))
            }
        },
    }
}

fn load_onnx(artifacts: &ForecastArtifacts) -> Result<LoadedForecastModel> {
    let columns = FeatureColumnOrder::load(&artifacts.column_order_path)?;
    let model = OnnxForecastModel::from_file(
        &artifacts.model_path,
        columns.len(),
        artifacts.model_sha256.as_deref(),
    )?;
    Ok(LoadedForecastModel {
        model: Box::new(model),
        columns,
    })
}

fn simulated(artifacts: &ForecastArtifacts) -> LoadedForecastModel {
    // Keep the persisted layout when it exists so rows have the trained shape
    let columns = if artifacts.column_order_path.exists() {
        FeatureColumnOrder::load(&artifacts.column_order_path).unwrap_or_default()
    } else {
        FeatureColumnOrder::default()
    };
    LoadedForecastModel {
        model: Box::new(SimulatedModel),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifacts_in(dir: &TempDir) -> ForecastArtifacts {
        ForecastArtifacts {
            model_path: dir.path().join("price_model.onnx"),
            column_order_path: dir.path().join("column_order.json"),
            model_sha256: None,
        }
    }

    #[test]
    fn test_auto_falls_back_to_simulation() {
        let dir = TempDir::new().unwrap();
        let loaded = load_forecast_model(ModelBackend::Auto, &artifacts_in(&dir)).unwrap();
        assert!(loaded.model.is_simulated());
        assert!(loaded.columns.is_empty());
    }

    #[test]
    fn test_onnx_backend_requires_artifacts() {
        let dir = TempDir::new().unwrap();
        assert!(load_forecast_model(ModelBackend::Onnx, &artifacts_in(&dir)).is_err());
    }

    #[test]
    fn test_simulated_keeps_persisted_columns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("column_order.json"), r#"["Min_Price","Max_Price"]"#).unwrap();

        let loaded = load_forecast_model(ModelBackend::Simulated, &artifacts_in(&dir)).unwrap();
        assert!(loaded.model.is_simulated());
        assert_eq!(loaded.columns.len(), 2);
    }

    #[test]
    fn test_auto_with_corrupt_model_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("column_order.json"), r#"["Min_Price","Max_Price"]"#).unwrap();
        std::fs::write(dir.path().join("price_model.onnx"), b"corrupt").unwrap();

        let loaded = load_forecast_model(ModelBackend::Auto, &artifacts_in(&dir)).unwrap();
        assert_eq!(loaded.model.name(), "simulated");
        assert_eq!(loaded.columns.len(), 2);
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let backend: ModelBackend = serde_json::from_str("\"simulated\"").unwrap();
        assert_eq!(backend, ModelBackend::Simulated);
    }
}
