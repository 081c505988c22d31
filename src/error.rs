//! Error taxonomy for the prediction pipeline.
//!
//! Every variant is fatal to the request that raised it. Messages carry the
//! column names and values needed to fix the source file.

use thiserror::Error;

/// Result alias used by the pipeline stages.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised while validating, coercing or predicting a single upload.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Column names or count do not match the feature schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(SchemaMismatch),

    /// One or more cells are empty or null.
    #[error("missing values in {} column(s): {}", .columns.len(), describe_missing(.columns))]
    MissingValue { columns: Vec<MissingColumn> },

    /// A cell could not be converted to a number.
    #[error("column '{column}' row {row}: cannot convert '{value}' to a number")]
    TypeCoercion {
        column: String,
        /// 1-based data row (header excluded)
        row: usize,
        value: String,
    },

    /// The model capability failed during prediction.
    #[error("inference failed for model '{model}': {source}")]
    Inference {
        model: String,
        #[source]
        source: crate::models::ModelError,
    },

    /// The upload could not be read as a table.
    #[error("unreadable input: {0}")]
    Input(String),

    /// Results were computed but could not be written.
    #[error("cannot write output: {0}")]
    Output(String),
}

/// Detail of a schema mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    /// Schema columns absent from the table (extras reported alongside).
    Columns {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Extra columns under the strict policy.
    Unexpected(Vec<String>),
    /// Header names that appear more than once (other defects reported alongside).
    Duplicated {
        duplicated: Vec<String>,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Count-only schema: width differs.
    Count { expected: usize, actual: usize },
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaMismatch::Columns {
                missing,
                unexpected,
            } => {
                write!(f, "missing columns [{}]", missing.join(", "))?;
                if !unexpected.is_empty() {
                    write!(f, "; unexpected columns [{}]", unexpected.join(", "))?;
                }
                Ok(())
            }
            SchemaMismatch::Unexpected(names) => {
                write!(f, "unexpected columns [{}]", names.join(", "))
            }
            SchemaMismatch::Duplicated {
                duplicated,
                missing,
                unexpected,
            } => {
                write!(f, "duplicated columns [{}]", duplicated.join(", "))?;
                if !missing.is_empty() {
                    write!(f, "; missing columns [{}]", missing.join(", "))?;
                }
                if !unexpected.is_empty() {
                    write!(f, "; unexpected columns [{}]", unexpected.join(", "))?;
                }
                Ok(())
            }
            SchemaMismatch::Count { expected, actual } => write!(
                f,
                "expected {} columns, found {} ({:+})",
                expected,
                actual,
                *actual as i64 - *expected as i64
            ),
        }
    }
}

/// A column holding at least one missing cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumn {
    pub name: String,
    /// Number of missing cells in the column
    pub count: usize,
}

fn describe_missing(columns: &[MissingColumn]) -> String {
    columns
        .iter()
        .map(|c| format!("{} ({} cell{})", c.name, c.count, if c.count == 1 { "" } else { "s" }))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    /// Short stable name of the error kind, used for metrics and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SchemaMismatch(_) => "schema_mismatch",
            PipelineError::MissingValue { .. } => "missing_value",
            PipelineError::TypeCoercion { .. } => "type_coercion",
            PipelineError::Inference { .. } => "inference",
            PipelineError::Input(_) => "input",
            PipelineError::Output(_) => "output",
        }
    }

    /// Names of the columns affected by a missing-value error.
    pub fn missing_columns(&self) -> Vec<&str> {
        match self {
            PipelineError::MissingValue { columns } => {
                columns.iter().map(|c| c.name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Input(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Input(err.to_string())
    }
}
