//! Column validation against the feature schema.

use crate::error::{PipelineError, PipelineResult, SchemaMismatch};
use crate::schema::FeatureSchema;
use crate::types::table::{RawTable, ValidatedTable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// How uploads with columns outside the schema are treated.
///
/// Chosen once at startup and applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPolicy {
    /// Extra columns are a schema mismatch
    StrictColumns,
    /// Extra columns are logged and dropped
    #[default]
    DropExtras,
}

/// Relationship between an upload's header and the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValidation {
    /// Same column set, in any order.
    Ok,
    /// Schema columns absent from the upload, in schema order. Extras are
    /// listed alongside so both can be fixed in one pass.
    Missing {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Every schema column present plus extras, in upload order.
    Unexpected(Vec<String>),
    /// Header names appearing more than once, with any missing and extra
    /// columns found in the same pass.
    Duplicated {
        duplicated: Vec<String>,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    /// Count-only schema and the widths differ.
    CountMismatch { expected: usize, actual: usize },
}

impl ColumnValidation {
    pub fn is_ok(&self) -> bool {
        matches!(self, ColumnValidation::Ok)
    }

    /// Whether the request must stop under `policy`.
    pub fn is_fatal(&self, policy: ColumnPolicy) -> bool {
        match self {
            ColumnValidation::Ok => false,
            ColumnValidation::Unexpected(_) => policy == ColumnPolicy::StrictColumns,
            _ => true,
        }
    }
}

/// Classify the upload's columns against `schema`. Pure inspection.
pub fn validate_columns(raw: &RawTable, schema: &FeatureSchema) -> ColumnValidation {
    let Some(names) = schema.names() else {
        return if raw.column_count() == schema.len() {
            ColumnValidation::Ok
        } else {
            ColumnValidation::CountMismatch {
                expected: schema.len(),
                actual: raw.column_count(),
            }
        };
    };

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut duplicated = Vec::new();
    for column in raw.columns() {
        let count = seen.entry(column.trim()).or_insert(0);
        *count += 1;
        if *count == 2 {
            duplicated.push(column.trim().to_string());
        }
    }
    let expected: HashSet<&str> = names.iter().map(String::as_str).collect();

    let missing: Vec<String> = names
        .iter()
        .filter(|name| !seen.contains_key(name.as_str()))
        .cloned()
        .collect();

    let unexpected: Vec<String> = raw
        .columns()
        .iter()
        .map(|c| c.trim())
        .filter(|c| !expected.contains(c))
        .map(str::to_string)
        .collect();

    if !duplicated.is_empty() {
        return ColumnValidation::Duplicated {
            duplicated,
            missing,
            unexpected,
        };
    }

    match (missing.is_empty(), unexpected.is_empty()) {
        (true, true) => ColumnValidation::Ok,
        (true, false) => ColumnValidation::Unexpected(unexpected),
        (false, _) => ColumnValidation::Missing {
            missing,
            unexpected,
        },
    }
}

/// Validate the upload's columns and return a view in schema order.
///
/// A count-only schema keeps the upload's own order, since there are no
/// names to align by.
pub fn align_columns<'a>(
    raw: &'a RawTable,
    schema: &FeatureSchema,
    policy: ColumnPolicy,
) -> PipelineResult<ValidatedTable<'a>> {
    let dropped = match validate_columns(raw, schema) {
        ColumnValidation::Ok => Vec::new(),
        ColumnValidation::Unexpected(extras) => match policy {
            ColumnPolicy::StrictColumns => {
                return Err(PipelineError::SchemaMismatch(SchemaMismatch::Unexpected(
                    extras,
                )))
            }
            ColumnPolicy::DropExtras => {
                warn!(columns = ?extras, "Dropping columns not in the feature schema");
                extras
            }
        },
        ColumnValidation::Missing {
            missing,
            unexpected,
        } => {
            return Err(PipelineError::SchemaMismatch(SchemaMismatch::Columns {
                missing,
                unexpected,
            }))
        }
        ColumnValidation::Duplicated {
            duplicated,
            missing,
            unexpected,
        } => {
            return Err(PipelineError::SchemaMismatch(SchemaMismatch::Duplicated {
                duplicated,
                missing,
                unexpected,
            }))
        }
        ColumnValidation::CountMismatch { expected, actual } => {
            return Err(PipelineError::SchemaMismatch(SchemaMismatch::Count {
                expected,
                actual,
            }))
        }
    };

    let (columns, source) = match schema.names() {
        Some(names) => {
            let source = names
                .iter()
                .map(|name| {
                    raw.column_index(name).ok_or_else(|| {
                        PipelineError::SchemaMismatch(SchemaMismatch::Columns {
                            missing: vec![name.clone()],
                            unexpected: Vec::new(),
                        })
                    })
                })
                .collect::<PipelineResult<Vec<_>>>()?;
            (names.to_vec(), source)
        }
        None => (
            raw.columns().iter().map(|c| c.trim().to_string()).collect(),
            (0..raw.column_count()).collect(),
        ),
    };

    Ok(ValidatedTable::new(raw, columns, source, dropped))
}
