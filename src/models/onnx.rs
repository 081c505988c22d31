//! ONNX Runtime backend for exported gradient-boosted classifiers.

use crate::models::classifier::{Classifier, ModelError};
use crate::models::loader::FeatureInfo;
use crate::types::table::FeatureMatrix;
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// Exported classifier run through an ONNX Runtime session.
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    feature_names: Option<Vec<String>>,
    feature_count: Option<usize>,
}

fn runtime(err: impl std::fmt::Display) -> ModelError {
    ModelError::Runtime(err.to_string())
}

impl OnnxClassifier {
    pub(crate) fn new(
        name: String,
        session: Session,
        input_name: String,
        output_name: String,
        info: FeatureInfo,
    ) -> Self {
        let feature_count = info
            .n_features
            .or_else(|| info.feature_names.as_ref().map(Vec::len));
        Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            feature_names: info.feature_names,
            feature_count,
        }
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Pull per-row class probabilities out of the session outputs.
    ///
    /// Handles tensor outputs (`[N, 2]`, `[N, 1]`, `[N]`) and the
    /// `seq(map(int64, float))` form some exporters emit.
    fn extract_probabilities(
        &self,
        outputs: &SessionOutputs,
        rows: usize,
    ) -> Result<Vec<[f64; 2]>, ModelError> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(proba) = self.probabilities_from_value(output, rows)? {
                return Ok(proba);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(proba) = self.probabilities_from_value(&output, rows)? {
                debug!(model = %self.name, output = %name, "Probabilities taken from fallback output");
                return Ok(proba);
            }
        }

        Err(ModelError::Output(format!(
            "no probability output found (expected '{}')",
            self.output_name
        )))
    }

    fn probabilities_from_value(
        &self,
        output: &DynValue,
        rows: usize,
    ) -> Result<Option<Vec<[f64; 2]>>, ModelError> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return probabilities_from_tensor(&dims, data, rows).map(Some);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.probabilities_from_sequence_map(output, rows).map(Some);
        }

        Ok(None)
    }

    /// One `map(int64, float)` per row, keyed by class index.
    fn probabilities_from_sequence_map(
        &self,
        output: &DynValue,
        rows: usize,
    ) -> Result<Vec<[f64; 2]>, ModelError> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| ModelError::Output(format!("failed to downcast to sequence: {e}")))?;

        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| ModelError::Output(e.to_string()))?;

        if maps.len() != rows {
            return Err(ModelError::Output(format!(
                "sequence output has {} entries for {} rows",
                maps.len(),
                rows
            )));
        }

        maps.iter()
            .map(|map_value| {
                let kv_pairs = map_value
                    .try_extract_key_values::<i64, f32>()
                    .map_err(|e| ModelError::Output(e.to_string()))?;

                let class = |id: i64| {
                    kv_pairs
                        .iter()
                        .find(|(k, _)| *k == id)
                        .map(|(_, p)| *p as f64)
                };

                match (class(0), class(1)) {
                    (Some(p0), Some(p1)) => Ok([p0, p1]),
                    (None, Some(p1)) => Ok([1.0 - p1, p1]),
                    (Some(p0), None) => Ok([p0, 1.0 - p0]),
                    (None, None) => Err(ModelError::Output(
                        "probability map has neither class 0 nor class 1".to_string(),
                    )),
                }
            })
            .collect()
    }
}

/// Probabilities from a dense tensor output.
fn probabilities_from_tensor(
    dims: &[i64],
    data: &[f32],
    rows: usize,
) -> Result<Vec<[f64; 2]>, ModelError> {
    let shape_error = || {
        ModelError::Output(format!(
            "unsupported probability shape {:?} for {} rows",
            dims, rows
        ))
    };

    let per_row = match dims {
        [n] if *n as usize == rows => 1,
        [n, k] if *n as usize == rows && (*k == 1 || *k == 2) => *k as usize,
        _ => return Err(shape_error()),
    };
    if data.len() != rows * per_row {
        return Err(shape_error());
    }

    Ok(data
        .chunks(per_row)
        .map(|chunk| {
            let p1 = chunk[per_row - 1] as f64;
            let p0 = if per_row == 2 { chunk[0] as f64 } else { 1.0 - p1 };
            [p0, p1]
        })
        .collect())
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn feature_count(&self) -> Option<usize> {
        self.feature_count
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Vec<[f64; 2]>, ModelError> {
        // Input tensor - shape [rows, features]
        let shape = vec![matrix.rows() as i64, matrix.cols() as i64];
        let input_tensor = Tensor::from_array((shape, matrix.to_f32())).map_err(runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ModelError::Runtime(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(runtime)?;

        let proba = self.extract_probabilities(&outputs, matrix.rows())?;
        debug!(model = %self.name, rows = proba.len(), "ONNX batch scored");
        Ok(proba)
    }
}
