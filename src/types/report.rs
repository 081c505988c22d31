//! Per-file run report

use crate::metrics::StageTimings;
use crate::summary::Summary;
use crate::validation::ColumnPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Record of one processed upload, written as JSON beside its result file
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Unique run identifier
    pub run_id: String,

    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,

    /// Upload the predictions were made for
    pub input: String,

    /// Result table location, when one was written
    pub output: Option<String>,

    /// Model that produced the predictions
    pub model: String,

    /// Column policy in force
    pub column_policy: ColumnPolicy,

    /// Decision threshold on P(Graduate)
    pub decision_threshold: f64,

    /// Rows scored
    pub rows: usize,

    /// Rows per predicted label
    pub summary: Summary,

    /// Upload columns removed before validation
    pub dropped_columns: Vec<String>,

    /// Stage wall times
    pub timings: StageTimings,
}

impl BatchReport {
    /// Create a report for a finished run
    pub fn new(input: &Path, model: &str, rows: usize, summary: Summary) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            input: input.display().to_string(),
            output: None,
            model: model.to_string(),
            column_policy: ColumnPolicy::default(),
            decision_threshold: crate::models::inference::DEFAULT_DECISION_THRESHOLD,
            rows,
            summary,
            dropped_columns: Vec::new(),
            timings: StageTimings::default(),
        }
    }

    /// Add the settings the run was made with
    pub fn with_settings(mut self, column_policy: ColumnPolicy, decision_threshold: f64) -> Self {
        self.column_policy = column_policy;
        self.decision_threshold = decision_threshold;
        self
    }

    /// Add validation and timing details
    pub fn with_details(mut self, dropped_columns: Vec<String>, timings: StageTimings) -> Self {
        self.dropped_columns = dropped_columns;
        self.timings = timings;
        self
    }

    pub fn with_output(mut self, output: &Path) -> Self {
        self.output = Some(output.display().to_string());
        self
    }

    /// `<result stem>.report.json` next to the result file
    pub fn path_for(output: &Path) -> PathBuf {
        output.with_extension("report.json")
    }

    /// Write the report as pretty JSON.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
