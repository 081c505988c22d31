//! Batch inference over a validated feature matrix

use crate::error::{PipelineError, PipelineResult};
use crate::models::classifier::{Classifier, ModelError};
use crate::types::result::{Outcome, PredictionResult};
use crate::types::table::FeatureMatrix;
use std::borrow::Cow;
use tracing::debug;

/// Allowed deviation of `P(Dropout) + P(Graduate)` from 1.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-4;

/// Default cut-off on `P(Graduate)`, matching a boosted classifier's `predict`.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Turns a feature matrix into one prediction per row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceEngine {
    /// Rows with `P(Graduate)` above this are labelled Graduate
    decision_threshold: f64,
}

impl InferenceEngine {
    pub fn new(decision_threshold: f64) -> Self {
        Self { decision_threshold }
    }

    pub fn decision_threshold(&self) -> f64 {
        self.decision_threshold
    }

    /// Score every row of `matrix` with a single batch call to the model.
    ///
    /// When the model records feature names the matrix is aligned to them
    /// by name first; otherwise columns are passed positionally. Either all
    /// rows get a prediction or the call fails.
    pub fn predict(
        &self,
        matrix: &FeatureMatrix,
        model: &dyn Classifier,
    ) -> PipelineResult<Vec<PredictionResult>> {
        let inference_error = |source: ModelError| PipelineError::Inference {
            model: model.name().to_string(),
            source,
        };

        let aligned = align_to_model(matrix, model).map_err(inference_error)?;

        let probabilities = model.predict_proba(&aligned).map_err(inference_error)?;

        if probabilities.len() != aligned.rows() {
            return Err(inference_error(ModelError::Output(format!(
                "{} probability rows for {} input rows",
                probabilities.len(),
                aligned.rows()
            ))));
        }

        let predictions = probabilities
            .iter()
            .enumerate()
            .map(|(row, &[dropout, graduate])| {
                check_probabilities(row, dropout, graduate)?;
                let outcome = if graduate > self.decision_threshold {
                    Outcome::Graduate
                } else {
                    Outcome::Dropout
                };
                Ok(PredictionResult {
                    outcome,
                    dropout_probability: dropout,
                    graduate_probability: graduate,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()
            .map_err(inference_error)?;

        debug!(
            model = %model.name(),
            rows = predictions.len(),
            threshold = self.decision_threshold,
            "Batch inference complete"
        );

        Ok(predictions)
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DECISION_THRESHOLD)
    }
}

/// Match the matrix to the model's recorded features.
fn align_to_model<'m>(
    matrix: &'m FeatureMatrix,
    model: &dyn Classifier,
) -> Result<Cow<'m, FeatureMatrix>, ModelError> {
    let aligned = match model.feature_names() {
        Some(names) if !same_names(names, matrix.columns()) => Cow::Owned(matrix.select(names)?),
        _ => Cow::Borrowed(matrix),
    };

    if let Some(expected) = model.feature_count() {
        if aligned.cols() != expected {
            return Err(ModelError::FeatureCount {
                expected,
                actual: aligned.cols(),
            });
        }
    }

    Ok(aligned)
}

/// Name lists equal after trimming, in order.
fn same_names(model: &[String], matrix: &[String]) -> bool {
    model.len() == matrix.len() && model.iter().zip(matrix).all(|(a, b)| a.trim() == b.trim())
}

fn check_probabilities(row: usize, dropout: f64, graduate: f64) -> Result<(), ModelError> {
    let valid = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
    if !valid(dropout) || !valid(graduate) {
        return Err(ModelError::Output(format!(
            "row {}: probabilities ({}, {}) outside [0, 1]",
            row + 1,
            dropout,
            graduate
        )));
    }
    if (dropout + graduate - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
        return Err(ModelError::Output(format!(
            "row {}: probabilities ({}, {}) do not sum to 1",
            row + 1,
            dropout,
            graduate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogisticClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    /// Returns fixed probabilities and counts how often it is called.
    struct Fixed {
        proba: Vec<[f64; 2]>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(proba: Vec<[f64; 2]>) -> Self {
            Self {
                proba,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(&self, _matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.proba.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn predict_proba(&self, _matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
            Err(ModelError::Runtime("booster exploded".to_string()))
        }
    }

    #[test]
    fn test_single_batch_call_and_row_alignment() {
        let model = Fixed::new(vec![[0.9, 0.1], [0.2, 0.8], [0.5, 0.5]]);
        let matrix = FeatureMatrix::from_rows(names(&["a"]), &[vec![1.0], vec![2.0], vec![3.0]]);

        let predictions = InferenceEngine::default().predict(&matrix, &model).unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let outcomes: Vec<Outcome> = predictions.iter().map(|p| p.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Dropout, Outcome::Graduate, Outcome::Dropout]);
        assert_eq!(predictions[1].graduate_probability, 0.8);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let model = Fixed::new(vec![[0.4, 0.6]]);
        let matrix = FeatureMatrix::from_rows(names(&["a"]), &[vec![0.0]]);

        let strict = InferenceEngine::new(0.7).predict(&matrix, &model).unwrap();
        assert_eq!(strict[0].outcome, Outcome::Dropout);
    }

    #[test]
    fn test_model_error_becomes_inference_error() {
        let matrix = FeatureMatrix::from_rows(names(&["a"]), &[vec![0.0]]);
        let err = InferenceEngine::default().predict(&matrix, &Failing).unwrap_err();

        match err {
            PipelineError::Inference { model, source } => {
                assert_eq!(model, "failing");
                assert!(source.to_string().contains("booster exploded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let matrix = FeatureMatrix::from_rows(names(&["a"]), &[vec![0.0], vec![0.0]]);

        let short = Fixed::new(vec![[0.5, 0.5]]);
        assert!(InferenceEngine::default().predict(&matrix, &short).is_err());

        let unnormalised = Fixed::new(vec![[0.5, 0.5], [0.7, 0.7]]);
        assert!(InferenceEngine::default().predict(&matrix, &unnormalised).is_err());

        let out_of_range = Fixed::new(vec![[0.5, 0.5], [-0.2, 1.2]]);
        assert!(InferenceEngine::default().predict(&matrix, &out_of_range).is_err());

        let nan = Fixed::new(vec![[0.5, 0.5], [f64::NAN, 0.5]]);
        assert!(InferenceEngine::default().predict(&matrix, &nan).is_err());
    }

    #[test]
    fn test_aligns_by_model_feature_names() {
        // Weight only on "b": the result depends on picking the right column.
        let model = LogisticClassifier::new("lr", vec![0.0, 10.0], 0.0)
            .with_feature_names(names(&["a", "b"]));
        let matrix = FeatureMatrix::from_rows(names(&["b", "a"]), &[vec![1.0, -1.0]]);

        let predictions = InferenceEngine::default().predict(&matrix, &model).unwrap();
        assert_eq!(predictions[0].outcome, Outcome::Graduate);
    }

    #[test]
    fn test_model_names_with_surrounding_whitespace() {
        // Fitted on a header that carried a trailing tab
        let model = LogisticClassifier::new("m", vec![0.5, -0.5], 0.0)
            .with_feature_names(names(&["a\t", "b"]));
        let matrix = FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0, 2.0]]);
        let swapped = FeatureMatrix::from_rows(names(&["b", "a"]), &[vec![2.0, 1.0]]);

        let engine = InferenceEngine::default();
        let direct = engine.predict(&matrix, &model).unwrap();
        let reordered = engine.predict(&swapped, &model).unwrap();

        assert_eq!(direct, reordered);
        assert_eq!(direct[0].outcome, Outcome::Dropout);
    }

    #[test]
    fn test_width_checked_against_feature_count() {
        let model = LogisticClassifier::new("lr", vec![1.0, 1.0], 0.0);
        let matrix = FeatureMatrix::from_rows(names(&["a"]), &[vec![1.0]]);

        let err = InferenceEngine::default().predict(&matrix, &model).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Inference { source: ModelError::FeatureCount { expected: 2, actual: 1 }, .. }
        ));
    }

    #[test]
    fn test_predictions_are_deterministic() {
        let model = LogisticClassifier::new("lr", vec![0.3, -0.2, 0.05], -0.1);
        let matrix = FeatureMatrix::from_rows(
            names(&["a", "b", "c"]),
            &[vec![1.0, 2.0, 3.0], vec![-4.0, 0.5, 10.0], vec![0.0, 0.0, 0.0]],
        );

        let engine = InferenceEngine::default();
        let first = engine.predict(&matrix, &model).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.predict(&matrix, &model).unwrap(), first);
        }
    }
}
