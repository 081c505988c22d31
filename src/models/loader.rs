//! Model artifact loader

use crate::config::{ArtifactKind, ModelConfig};
use crate::models::classifier::Classifier;
use crate::models::linear::LogisticClassifier;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Training-time feature metadata written next to an exported model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    /// Feature names in fit order
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Number of features the model was fitted on
    #[serde(default)]
    pub n_features: Option<usize>,
}

impl FeatureInfo {
    /// Read a `feature_info.json` file. A missing file yields empty metadata.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Feature metadata not found; model exposes no feature names");
            return Ok(Self::default());
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read feature metadata from {}", path.display()))?;
        let info: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse feature metadata {}", path.display()))?;

        if let (Some(names), Some(count)) = (&info.feature_names, info.n_features) {
            if names.len() != count {
                anyhow::bail!(
                    "{} lists {} feature names but n_features = {}",
                    path.display(),
                    names.len(),
                    count
                );
            }
        }

        Ok(info)
    }
}

/// Loader for classifier artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the configured model.
    pub fn load(&self, config: &ModelConfig) -> Result<Box<dyn Classifier>> {
        let path = Path::new(&config.path);
        let kind = config.format.resolve(path)?;

        info!(path = %path.display(), kind = ?kind, "Loading model");

        match kind {
            ArtifactKind::Logistic => Ok(Box::new(LogisticClassifier::from_json_path(path)?)),
            ArtifactKind::Onnx => {
                let metadata_path = config
                    .metadata_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| default_metadata_path(path));
                let info = FeatureInfo::load(&metadata_path)?;
                let name = config.name.clone().unwrap_or_else(|| model_stem(path));
                self.load_onnx(path, &name, info)
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path, name: &str, info: FeatureInfo) -> Result<Box<dyn Classifier>> {
        use crate::models::onnx::OnnxClassifier;
        use ort::session::{builder::GraphOptimizationLevel, Session};

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_name = probability_output(&output_names)
            .or_else(|| output_names.last().cloned())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            named_features = info.feature_names.is_some(),
            n_features = ?info.n_features,
            "Model loaded successfully"
        );

        Ok(Box::new(OnnxClassifier::new(
            name.to_string(),
            session,
            input_name,
            output_name,
            info,
        )))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path, _name: &str, _info: FeatureInfo) -> Result<Box<dyn Classifier>> {
        anyhow::bail!(
            "{} is an ONNX model but this build has the `onnx` feature disabled",
            path.display()
        )
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// `feature_info.json` in the model's directory.
fn default_metadata_path(model_path: &Path) -> PathBuf {
    model_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("feature_info.json")
}

/// Name of the output most likely to hold class probabilities.
///
/// Exporters call it `probabilities`, `output_probability` or a bare
/// `output`; label outputs are never picked.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
fn probability_output(names: &[String]) -> Option<String> {
    names
        .iter()
        .find(|n| n.contains("prob"))
        .or_else(|| names.iter().find(|n| n.contains("output") && !n.contains("label")))
        .cloned()
}

fn model_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}
