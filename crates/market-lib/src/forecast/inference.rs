//! Price regression inference
//!
//! `OnnxForecastModel` runs a gradient-boosted regressor exported to ONNX
//! through tract. `SimulatedModel` stands in when no model is available and
//! doubles as the per-point fallback.

use super::features::FeatureRow;
use super::ForecastModel;
use crate::artifacts;
use anyhow::{Context, Result};
use rand::{Rng, RngCore};
use std::path::Path;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 20;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX regression model with a fixed input width
pub struct OnnxForecastModel {
    model: TractModel,
    num_features: usize,
    version: String,
}

impl OnnxForecastModel {
    /// Create a model from ONNX bytes expecting `num_features` inputs
    pub fn new(model_bytes: &[u8], num_features: usize, version: impl Into<String>) -> Result<Self> {
        if num_features == 0 {
            anyhow::bail!("Cannot build a regression model with zero input features");
        }
        let model = Self::load_model(model_bytes, num_features)?;
        Ok(Self {
            model,
            num_features,
            version: version.into(),
        })
    }

    /// Load from disk, verifying the checksum when one is given
    pub fn from_file(path: &Path, num_features: usize, expected_sha256: Option<&str>) -> Result<Self> {
        let bytes = artifacts::read_verified(path, expected_sha256)?;
        let version = artifacts::sha256_hex(&bytes)[..12].to_string();
        let model = Self::new(&bytes, num_features, version)
            .with_context(|| format!("Failed to load price model {:?}", path))?;
        info!(path = ?path, features = num_features, version = %model.version, "Loaded price model");
        Ok(model)
    }

    fn load_model(model_bytes: &[u8], num_features: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, num_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn row_to_tensor(&self, row: &FeatureRow) -> Result<Tensor> {
        if row.len() != self.num_features {
            anyhow::bail!(
                "Feature row has {} columns, model expects {}",
                row.len(),
                self.num_features
            );
        }
        let array = tract_ndarray::Array2::from_shape_vec((1, self.num_features), row.values().to_vec())
            .context("Failed to shape feature row")?;
        Ok(array.into())
    }
}

impl ForecastModel for OnnxForecastModel {
    fn predict(&self, row: &FeatureRow, _rng: &mut dyn RngCore) -> Result<f64> {
        let start = Instant::now();
        let input = self.row_to_tensor(row)?;

        let result = self.model.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        let value = output
            .to_array_view::<f32>()?
            .iter()
            .next()
            .copied()
            .context("Model output is empty")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        if !value.is_finite() {
            anyhow::bail!("Model produced a non-finite price: {}", value);
        }
        Ok(value as f64)
    }

    fn name(&self) -> &str {
        "onnx"
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// Draws a whole-rupee price between the row's min and max price
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedModel;

impl SimulatedModel {
    /// Uniform integer between the row's drawn prices, inclusive.
    ///
    /// The endpoints are ordered first: the min/max draws are independent
    /// and may be inverted for commodities with overlapping ranges.
    pub fn draw<R: Rng + ?Sized>(row: &FeatureRow, rng: &mut R) -> u32 {
        let low = row.min_price.min(row.max_price);
        let high = row.min_price.max(row.max_price);
        rng.gen_range(low..=high)
    }
}

impl ForecastModel for SimulatedModel {
    fn predict(&self, row: &FeatureRow, rng: &mut dyn RngCore) -> Result<f64> {
        Ok(Self::draw(row, rng) as f64)
    }

    fn name(&self) -> &str {
        "simulated"
    }

    fn version(&self) -> &str {
        "simulated"
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
