//! Per-file processing loop for a batch of uploads.
//!
//! Each upload is an independent request: a failure while reading,
//! validating, scoring or writing one file is recorded and logged, and the
//! loop moves on to the next.

use crate::config::IoConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::io::{output_path_for, write_result_table_path, Delimiter};
use crate::metrics::PipelineMetrics;
use crate::pipeline::{PipelineOutput, PredictionPipeline};
use crate::types::report::BatchReport;
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where and how results are written.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub delimiter: Delimiter,
    pub include_dropout_probability: bool,
    pub write_report: bool,
}

impl BatchOptions {
    pub fn from_config(io: &IoConfig) -> Result<Self> {
        Ok(Self {
            output_dir: PathBuf::from(&io.output_dir),
            delimiter: Delimiter::parse(&io.delimiter)?,
            include_dropout_probability: io.include_dropout_probability,
            write_report: io.write_report,
        })
    }
}

/// Result of one upload: the result table path, or why it failed.
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: PipelineResult<PathBuf>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result paths handed out in one run; never gives the same path twice.
#[derive(Debug, Default)]
pub struct OutputPaths {
    claimed: HashSet<PathBuf>,
}

impl OutputPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<stem>_predictions.csv`, or `<stem>_predictions_<n>.csv` when an
    /// earlier upload with the same stem already took that name.
    pub fn claim(&mut self, input: &Path, output_dir: &Path) -> PathBuf {
        let base = output_path_for(input, output_dir);
        if self.claimed.insert(base.clone()) {
            return base;
        }

        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut n = 2;
        loop {
            let candidate = output_dir.join(format!("{}_{}.csv", stem, n));
            if self.claimed.insert(candidate.clone()) {
                warn!(
                    input = %input.display(),
                    output = %candidate.display(),
                    "Result name already used in this run; writing to a numbered file"
                );
                return candidate;
            }
            n += 1;
        }
    }
}

/// Run every upload through `pipeline` and write its results.
///
/// Returns one outcome per input, in input order.
pub fn process_uploads(
    pipeline: &PredictionPipeline<'_>,
    inputs: &[PathBuf],
    options: &BatchOptions,
    metrics: &PipelineMetrics,
) -> Vec<FileOutcome> {
    let mut paths = OutputPaths::new();

    inputs
        .iter()
        .map(|input| {
            let result = pipeline
                .run_path(input, options.delimiter)
                .and_then(|output| {
                    let result_path = paths.claim(input, &options.output_dir);
                    write_outputs(pipeline, input, &output, &result_path, options)?;
                    Ok((output, result_path))
                });

            match result {
                Ok((output, result_path)) => {
                    metrics.record_success(&output.summary, &output.timings);
                    info!(
                        input = %input.display(),
                        output = %result_path.display(),
                        rows = output.result_table.row_count(),
                        summary = ?output.summary,
                        "Upload processed"
                    );
                    FileOutcome {
                        input: input.clone(),
                        result: Ok(result_path),
                    }
                }
                Err(e) => {
                    metrics.record_failure(&e);
                    log_failure(input, &e);
                    FileOutcome {
                        input: input.clone(),
                        result: Err(e),
                    }
                }
            }
        })
        .collect()
}

fn write_outputs(
    pipeline: &PredictionPipeline<'_>,
    input: &Path,
    output: &PipelineOutput,
    result_path: &Path,
    options: &BatchOptions,
) -> PipelineResult<()> {
    let output_error =
        |path: &Path, e: anyhow::Error| PipelineError::Output(format!("{}: {:#}", path.display(), e));

    write_result_table_path(
        result_path,
        &output.result_table,
        options.delimiter.for_output(),
        options.include_dropout_probability,
    )
    .map_err(|e| output_error(result_path, e))?;

    if options.write_report {
        let report_path = BatchReport::path_for(result_path);
        BatchReport::new(
            input,
            pipeline.model().name(),
            output.result_table.row_count(),
            output.summary.clone(),
        )
        .with_settings(pipeline.policy(), pipeline.decision_threshold())
        .with_details(output.dropped_columns.clone(), output.timings)
        .with_output(result_path)
        .write_to(&report_path)
        .map_err(|e| output_error(&report_path, e))?;
    }

    Ok(())
}

fn log_failure(input: &Path, e: &PipelineError) {
    match e {
        PipelineError::MissingValue { .. } => error!(
            input = %input.display(),
            kind = e.kind(),
            columns = ?e.missing_columns(),
            error = %e,
            "Upload rejected"
        ),
        _ => error!(
            input = %input.display(),
            kind = e.kind(),
            error = %e,
            "Upload rejected"
        ),
    }
}
