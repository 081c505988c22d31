//! End-to-end prediction over one upload.
//!
//! Stages run in a fixed order and the first failure ends the request:
//! column alignment, value coercion, batch inference, result assembly,
//! summary.

use crate::config::ValidationConfig;
use crate::error::PipelineResult;
use crate::io::{read_table_path, Delimiter};
use crate::metrics::{Stage, StageTimings};
use crate::models::{Classifier, InferenceEngine};
use crate::schema::{FeatureSchema, SchemaRegistry, SchemaSource};
use crate::summary::{summarize, Summary};
use crate::types::result::ResultTable;
use crate::types::table::RawTable;
use crate::validation::{align_columns, validate_and_coerce, ColumnPolicy};
use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Everything one successful request produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result_table: ResultTable,
    pub summary: Summary,
    /// Upload columns removed under [`ColumnPolicy::DropExtras`]
    pub dropped_columns: Vec<String>,
    pub timings: StageTimings,
}

/// Validates uploads against a model's schema and scores them.
///
/// The model is loaded once and borrowed; requests share nothing else.
pub struct PredictionPipeline<'m> {
    model: &'m dyn Classifier,
    schema: FeatureSchema,
    schema_source: SchemaSource,
    policy: ColumnPolicy,
    engine: InferenceEngine,
}

impl<'m> PredictionPipeline<'m> {
    /// Pipeline with the schema resolved from the model's metadata.
    pub fn new(model: &'m dyn Classifier, policy: ColumnPolicy, decision_threshold: f64) -> Result<Self> {
        let (schema, schema_source) = SchemaRegistry::resolve(model)?;
        Ok(Self {
            model,
            schema,
            schema_source,
            policy,
            engine: InferenceEngine::new(decision_threshold),
        })
    }

    pub fn from_config(model: &'m dyn Classifier, config: &ValidationConfig) -> Result<Self> {
        Self::new(model, config.column_policy, config.decision_threshold)
    }

    /// Replace the resolved schema.
    pub fn with_schema(mut self, schema: FeatureSchema, source: SchemaSource) -> Self {
        self.schema = schema;
        self.schema_source = source;
        self
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn schema_source(&self) -> SchemaSource {
        self.schema_source
    }

    pub fn policy(&self) -> ColumnPolicy {
        self.policy
    }

    pub fn decision_threshold(&self) -> f64 {
        self.engine.decision_threshold()
    }

    /// Run every stage over an already-read table.
    pub fn run(&self, raw: &RawTable) -> PipelineResult<PipelineOutput> {
        let mut timings = StageTimings::default();
        self.run_timed(raw, &mut timings)
    }

    /// Read `path` and run every stage over it.
    pub fn run_path<P: AsRef<Path>>(&self, path: P, delimiter: Delimiter) -> PipelineResult<PipelineOutput> {
        let path = path.as_ref();
        let mut timings = StageTimings::default();

        let start = Instant::now();
        let raw = read_table_path(path, delimiter)?;
        timings.set(Stage::Read, start.elapsed());
        debug!(
            input = %path.display(),
            rows = raw.row_count(),
            columns = raw.column_count(),
            "Upload read"
        );

        self.run_timed(&raw, &mut timings)
    }

    fn run_timed(&self, raw: &RawTable, timings: &mut StageTimings) -> PipelineResult<PipelineOutput> {
        let start = Instant::now();
        let validated = align_columns(raw, &self.schema, self.policy)?;
        timings.set(Stage::Columns, start.elapsed());
        debug!(columns = validated.column_count(), "Columns validated");

        let start = Instant::now();
        let matrix = validate_and_coerce(&validated)?;
        timings.set(Stage::Values, start.elapsed());
        debug!(rows = matrix.rows(), "Values coerced");

        let start = Instant::now();
        let predictions = self.engine.predict(&matrix, self.model)?;
        timings.set(Stage::Inference, start.elapsed());

        let start = Instant::now();
        let result_table = ResultTable::new(matrix, predictions);
        let summary = summarize(&result_table);
        timings.set(Stage::Summary, start.elapsed());

        info!(
            model = %self.model.name(),
            rows = result_table.row_count(),
            summary = ?summary,
            total_us = timings.total_us(),
            "Predictions complete"
        );

        Ok(PipelineOutput {
            dropped_columns: validated.dropped_columns().to_vec(),
            result_table,
            summary,
            timings: *timings,
        })
    }
}
