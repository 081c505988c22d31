//! Logistic-regression classifier stored as JSON.
//!
//! ```json
//! { "name": "dropout_logistic", "feature_names": ["..."], "weights": [0.1, ...], "bias": -0.3 }
//! ```
//!
//! `P(Graduate) = sigmoid(weights · x + bias)`. `feature_names` is optional;
//! without it the model only records its feature count.

use crate::models::classifier::{Classifier, ModelError};
use crate::types::table::FeatureMatrix;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feature_names: Option<Vec<String>>,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticClassifier {
    pub fn new(name: &str, weights: Vec<f64>, bias: f64) -> Self {
        Self {
            name: name.to_string(),
            feature_names: None,
            weights,
            bias,
        }
    }

    /// Attach training-time feature names.
    ///
    /// # Panics
    ///
    /// Panics if the name count differs from the weight count.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        assert_eq!(names.len(), self.weights.len(), "one name per weight");
        self.feature_names = Some(names);
        self
    }

    /// Load from a JSON file.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read logistic model from {}", path.display()))?;
        let model: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse logistic model {}", path.display()))?;
        model.check()?;

        info!(
            model = %model.name,
            path = %path.display(),
            features = model.weights.len(),
            named = model.feature_names.is_some(),
            "Logistic model loaded"
        );
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if self.weights.is_empty() {
            anyhow::bail!("logistic model '{}' has no weights", self.name);
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.weights.len() {
                anyhow::bail!(
                    "logistic model '{}' has {} feature names for {} weights",
                    self.name,
                    names.len(),
                    self.weights.len()
                );
            }
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            anyhow::bail!("logistic model '{}' has non-finite coefficients", self.name);
        }
        Ok(())
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for LogisticClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn feature_count(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
        if matrix.cols() != self.weights.len() {
            return Err(ModelError::FeatureCount {
                expected: self.weights.len(),
                actual: matrix.cols(),
            });
        }

        Ok((0..matrix.rows())
            .map(|row| {
                let z: f64 = matrix
                    .row(row)
                    .iter()
                    .zip(&self.weights)
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + self.bias;
                let p = sigmoid(z);
                [1.0 - p, p]
            })
            .collect())
    }
}
