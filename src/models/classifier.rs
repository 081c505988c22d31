//! The opaque classifier capability the pipeline runs against.

use crate::models::inference::DEFAULT_DECISION_THRESHOLD;
use crate::types::table::FeatureMatrix;
use thiserror::Error;

/// Errors raised by a classifier backend.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("unexpected model output: {0}")]
    Output(String),

    #[error("input has {actual} features, model expects {expected}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("feature '{0}' required by the model is not in the input")]
    MissingFeature(String),
}

/// A fitted binary classifier (class 0 = Dropout, class 1 = Graduate).
///
/// Loaded once and shared read-only across requests.
pub trait Classifier: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Feature names recorded at training time, in fit order.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Number of features the model was fitted on.
    fn feature_count(&self) -> Option<usize> {
        self.feature_names().map(|names| names.len())
    }

    /// `[P(class 0), P(class 1)]` for every row, in row order.
    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError>;

    /// Class index for every row at the fixed 0.5 cut-off
    /// ([`DEFAULT_DECISION_THRESHOLD`]).
    ///
    /// The pipeline labels rows with [`InferenceEngine`] instead, which
    /// honours the configured threshold; use that when the cut-off is not 0.5.
    ///
    /// [`InferenceEngine`]: crate::models::InferenceEngine
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(matrix)?
            .iter()
            .map(|p| u8::from(p[1] > DEFAULT_DECISION_THRESHOLD))
            .collect())
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn feature_names(&self) -> Option<&[String]> {
        (**self).feature_names()
    }

    fn feature_count(&self) -> Option<usize> {
        (**self).feature_count()
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
        (**self).predict_proba(matrix)
    }

    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<u8>, ModelError> {
        (**self).predict(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InferenceEngine;

    struct Fixed(Vec<[f64; 2]>);

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(&self, _matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_predict_matches_engine_at_default_threshold() {
        let model = Fixed(vec![[0.6, 0.4], [0.5, 0.5], [0.2, 0.8]]);
        let matrix = FeatureMatrix::from_rows(vec!["a".to_string()], &[vec![0.0], vec![0.0], vec![0.0]]);

        let classes = model.predict(&matrix).unwrap();
        assert_eq!(classes, vec![0, 0, 1]);

        let engine: Vec<u8> = InferenceEngine::default()
            .predict(&matrix, &model)
            .unwrap()
            .iter()
            .map(|p| p.class_index())
            .collect();
        assert_eq!(classes, engine);
    }

    #[test]
    fn test_boxed_classifier_forwards() {
        let model: Box<dyn Classifier> = Box::new(Fixed(vec![[0.1, 0.9]]));
        let matrix = FeatureMatrix::from_rows(vec!["a".to_string()], &[vec![0.0]]);

        assert_eq!(Classifier::name(&model), "fixed");
        assert_eq!(model.predict(&matrix).unwrap(), vec![1]);
    }
}
