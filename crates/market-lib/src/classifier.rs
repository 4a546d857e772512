//! Plant disease classification
//!
//! Wraps an image classifier exported to ONNX. Uploaded images are decoded,
//! resized to the model's 224x224 input and scaled to `[0, 1]`; the arg-max
//! class is turned into user-facing guidance through a keyword advice table.
//! Without a model the demo classifier answers with a fixed diagnosis.

use crate::artifacts;
use crate::models::Diagnosis;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info, warn};

/// Side length of the square model input
pub const IMAGE_SIZE: u32 = 224;

const HEALTHY_ADVICE: &str = "Plant looks healthy!";
const DEFAULT_ADVICE: &str = "Consult an expert.";
const UNKNOWN_LABEL: &str = "Unknown Disease";

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Classification failures
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error(transparent)]
    Inference(#[from] anyhow::Error),
}

/// Trait for disease classifier backends
pub trait DiseaseClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Diagnosis, ClassifyError>;

    fn name(&self) -> &str;

    fn is_demo(&self) -> bool {
        false
    }
}

/// Tensor layout the exported model expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLayout {
    /// `[1, H, W, 3]`, as exported from Keras
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, as exported from PyTorch
    Nchw,
}

/// Keyword → advice lookup; first matching keyword wins
#[derive(Debug, Clone)]
pub struct AdviceTable {
    entries: Vec<(String, String)>,
}

impl Default for AdviceTable {
    fn default() -> Self {
        let entries = [
            ("bacterial spot", "Remove infected leaves, avoid overhead watering and apply a copper-based bactericide."),
            ("early blight", "Prune the lower leaves, mulch the soil and apply a chlorothalonil or copper fungicide."),
            ("late blight", "Destroy infected plants promptly and protect the rest with a mancozeb spray."),
            ("leaf mold", "Improve ventilation, lower humidity and apply a suitable fungicide."),
            ("septoria", "Remove spotted leaves, rotate crops and apply a protective fungicide."),
            ("spider mite", "Spray neem oil or insecticidal soap and keep the plants well watered."),
            ("target spot", "Remove affected foliage and apply a broad-spectrum fungicide."),
            ("mosaic virus", "Remove infected plants, control aphids and disinfect tools."),
            ("yellow leaf curl", "Control whiteflies with sticky traps and remove infected plants."),
            ("powdery mildew", "Apply sulfur or potassium bicarbonate sprays and improve air circulation."),
            ("rust", "Remove infected leaves and apply a fungicide labelled for rust."),
            ("scab", "Rake up fallen leaves and apply a fungicide at bud break."),
            ("black rot", "Prune out cankers and mummified fruit and apply captan or a copper spray."),
        ];
        Self {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl AdviceTable {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Guidance text for a predicted label
    pub fn advice_for(&self, label: &str, healthy: bool) -> String {
        if healthy {
            return HEALTHY_ADVICE.to_string();
        }
        let normalized = label.replace('_', " ").to_lowercase();
        self.entries
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword.as_str()))
            .map(|(_, advice)| advice.clone())
            .unwrap_or_else(|| DEFAULT_ADVICE.to_string())
    }
}

/// Build a diagnosis from a raw label and probability
pub fn diagnose(label: &str, confidence: f32, advice: &AdviceTable) -> Diagnosis {
    let healthy = label.to_lowercase().contains("healthy");
    Diagnosis {
        disease: label.replace('_', " "),
        confidence: format!("{:.2}%", confidence * 100.0),
        status: if healthy { "Healthy" } else { "Infected" }.to_string(),
        advice: advice.advice_for(label, healthy),
    }
}

/// Load class labels from a JSON (or Python-literal) list, or one label per line
pub fn load_class_labels(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read class labels {:?}", path))?;
    let trimmed = content.trim();

    let labels: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)
            .or_else(|_| serde_json::from_str(&trimmed.replace('\'', "\"")))
            .with_context(|| format!("Failed to parse class label list {:?}", path))?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    };

    if labels.is_empty() {
        anyhow::bail!("Class label file {:?} is empty", path);
    }
    Ok(labels)
}

fn decode(image_bytes: &[u8]) -> Result<image::DynamicImage, ClassifyError> {
    image::load_from_memory(image_bytes).map_err(|e| ClassifyError::InvalidImage(e.to_string()))
}

/// Resize and scale an image into a flat model input buffer
pub fn preprocess(img: &image::DynamicImage, layout: ImageLayout) -> Vec<f32> {
    let rgb = img
        .resize_exact(IMAGE_SIZE, IMAGE_SIZE, FilterType::CatmullRom)
        .to_rgb8();
    match layout {
        ImageLayout::Nhwc => rgb
            .pixels()
            .flat_map(|p| p.0.map(|c| c as f32 / 255.0))
            .collect(),
        ImageLayout::Nchw => (0..3)
            .flat_map(|channel| rgb.pixels().map(move |p| p.0[channel] as f32 / 255.0))
            .collect(),
    }
}

/// ONNX image classifier
pub struct OnnxDiseaseClassifier {
    model: TractModel,
    labels: Vec<String>,
    layout: ImageLayout,
    advice: AdviceTable,
}

impl OnnxDiseaseClassifier {
    pub fn new(model_bytes: &[u8], labels: Vec<String>, layout: ImageLayout) -> Result<Self> {
        let size = IMAGE_SIZE as usize;
        let shape = match layout {
            ImageLayout::Nhwc => [1, size, size, 3],
            ImageLayout::Nchw => [1, 3, size, size],
        };
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact(shape).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self {
            model,
            labels,
            layout,
            advice: AdviceTable::default(),
        })
    }

    fn to_tensor(&self, input: Vec<f32>) -> Result<Tensor> {
        let size = IMAGE_SIZE as usize;
        let shape = match self.layout {
            ImageLayout::Nhwc => (1, size, size, 3),
            ImageLayout::Nchw => (1, 3, size, size),
        };
        let array = tract_ndarray::Array4::from_shape_vec(shape, input)
            .context("Failed to shape image tensor")?;
        Ok(array.into())
    }
}

impl DiseaseClassifier for OnnxDiseaseClassifier {
    fn classify(&self, image_bytes: &[u8]) -> Result<Diagnosis, ClassifyError> {
        let img = decode(image_bytes)?;
        let input = self.to_tensor(preprocess(&img, self.layout))?;

        let result = self
            .model
            .run(tvec!(input.into()))
            .context("Model execution failed")?;
        let output = result.first().context("No output from model")?;
        let scores = output
            .to_array_view::<f32>()
            .context("Model output is not f32")?;

        let (class_idx, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            })
            .context("Model output is empty")?;

        let label = self
            .labels
            .get(class_idx)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL);
        debug!(class_idx, confidence, label = %label, "Image classified");

        Ok(diagnose(label, confidence, &self.advice))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Fixed answer used when no classifier model is available
#[derive(Debug, Clone, Default)]
pub struct DemoClassifier;

impl DiseaseClassifier for DemoClassifier {
    fn classify(&self, image_bytes: &[u8]) -> Result<Diagnosis, ClassifyError> {
        decode(image_bytes)?;
        Ok(Diagnosis {
            disease: "Demo: Tomato Bacterial Spot".to_string(),
            confidence: "98.5% (Mock)".to_string(),
            status: "Infected".to_string(),
            advice: "Demo mode: provide a disease model and class label file to enable real detection."
                .to_string(),
        })
    }

    fn name(&self) -> &str {
        "demo"
    }

    fn is_demo(&self) -> bool {
        true
    }
}

/// Locations of the classifier artifacts
#[derive(Debug, Clone)]
pub struct ClassifierArtifacts {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub model_sha256: Option<String>,
    pub layout: ImageLayout,
}

/// Load the ONNX classifier, or the demo classifier when anything is missing
pub fn load_disease_classifier(artifacts: &ClassifierArtifacts) -> Box<dyn DiseaseClassifier> {
    match try_load_onnx(artifacts) {
        Ok(classifier) => {
            info!(
                path = ?artifacts.model_path,
                classes = classifier.labels.len(),
                "Disease classifier loaded"
            );
            Box::new(classifier)
        }
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Disease model unavailable, running in demo mode");
            Box::new(DemoClassifier)
        }
    }
}

fn try_load_onnx(artifacts: &ClassifierArtifacts) -> Result<OnnxDiseaseClassifier> {
    let labels = load_class_labels(&artifacts.labels_path)?;
    let bytes = artifacts::read_verified(&artifacts.model_path, artifacts.model_sha256.as_deref())?;
    OnnxDiseaseClassifier::new(&bytes, labels, artifacts.layout)
        .with_context(|| format!("Failed to load disease model {:?}", artifacts.model_path))
}
