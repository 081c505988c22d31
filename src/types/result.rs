//! Prediction outputs.

use crate::types::table::FeatureMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicted student outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Dropout,
    Graduate,
}

impl Outcome {
    /// Both outcomes, in class-index order.
    pub const ALL: [Outcome; 2] = [Outcome::Dropout, Outcome::Graduate];

    /// Outcome for a class index (0 = Dropout, 1 = Graduate).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Outcome::Dropout),
            1 => Some(Outcome::Graduate),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Outcome::Dropout => 0,
            Outcome::Graduate => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Dropout => "Dropout",
            Outcome::Graduate => "Graduate",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prediction for one input row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub outcome: Outcome,
    /// P(Dropout), in [0, 1]
    pub dropout_probability: f64,
    /// P(Graduate), in [0, 1]
    pub graduate_probability: f64,
}

impl PredictionResult {
    pub fn class_index(&self) -> u8 {
        self.outcome.index()
    }

    pub fn label(&self) -> &'static str {
        self.outcome.label()
    }
}

/// Names of the columns appended to the validated features, in output order.
pub const PREDICTION_COLUMN: &str = "prediction";
pub const LABEL_COLUMN: &str = "prediction_label";
pub const GRADUATE_PROBABILITY_COLUMN: &str = "graduate_probability";
pub const DROPOUT_PROBABILITY_COLUMN: &str = "dropout_probability";

/// Validated feature columns with one prediction per row.
///
/// Row `i` of the predictions belongs to row `i` of the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    features: FeatureMatrix,
    predictions: Vec<PredictionResult>,
}

impl ResultTable {
    /// # Panics
    ///
    /// Panics if the prediction count differs from the matrix row count.
    pub fn new(features: FeatureMatrix, predictions: Vec<PredictionResult>) -> Self {
        assert_eq!(
            features.rows(),
            predictions.len(),
            "one prediction per feature row"
        );
        Self {
            features,
            predictions,
        }
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn predictions(&self) -> &[PredictionResult] {
        &self.predictions
    }

    pub fn row_count(&self) -> usize {
        self.predictions.len()
    }

    /// Output header: feature columns then the prediction columns.
    pub fn header(&self, include_dropout_probability: bool) -> Vec<String> {
        let mut header = self.features.columns().to_vec();
        header.push(PREDICTION_COLUMN.to_string());
        header.push(LABEL_COLUMN.to_string());
        header.push(GRADUATE_PROBABILITY_COLUMN.to_string());
        if include_dropout_probability {
            header.push(DROPOUT_PROBABILITY_COLUMN.to_string());
        }
        header
    }

    /// Rows as `(feature values, prediction)` pairs, in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &PredictionResult)> {
        (0..self.row_count()).map(move |i| (self.features.row(i), &self.predictions[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(Outcome::from_index(0), Some(Outcome::Dropout));
        assert_eq!(Outcome::from_index(1), Some(Outcome::Graduate));
        assert_eq!(Outcome::from_index(2), None);
        assert_eq!(Outcome::Graduate.index(), 1);
        assert_eq!(Outcome::Dropout.to_string(), "Dropout");
    }

    #[test]
    fn test_result_table_header() {
        let matrix = FeatureMatrix::from_rows(vec!["a".to_string()], &[vec![1.0]]);
        let table = ResultTable::new(
            matrix,
            vec![PredictionResult {
                outcome: Outcome::Graduate,
                dropout_probability: 0.2,
                graduate_probability: 0.8,
            }],
        );

        assert_eq!(
            table.header(false),
            vec!["a", "prediction", "prediction_label", "graduate_probability"]
        );
        assert_eq!(table.header(true).last().map(String::as_str), Some("dropout_probability"));

        let (values, prediction) = table.iter().next().unwrap();
        assert_eq!(values, &[1.0]);
        assert_eq!(prediction.class_index(), 1);
        assert_eq!(prediction.label(), "Graduate");
    }
}
