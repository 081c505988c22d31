//! Missing-value checks and numeric coercion.
//!
//! This is the single point where untyped upload cells become `f64`.

use crate::error::{MissingColumn, PipelineError, PipelineResult};
use crate::types::table::{FeatureMatrix, ValidatedTable};
use tracing::debug;

/// Cell contents treated as missing, in addition to empty cells.
pub const NULL_TOKENS: [&str; 7] = ["NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Whether a cell counts as missing.
pub fn is_missing(cell: Option<&str>) -> bool {
    match cell {
        None => true,
        Some(value) => {
            let value = value.trim();
            value.is_empty() || NULL_TOKENS.contains(&value)
        }
    }
}

/// Parse a cell as a finite number.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Check every cell is present and numeric, and build the feature matrix.
///
/// Missing cells are reported for every affected column before any
/// coercion is attempted. The first unparseable cell, scanning columns in
/// model order, aborts with its column, row and value.
pub fn validate_and_coerce(table: &ValidatedTable<'_>) -> PipelineResult<FeatureMatrix> {
    let rows = table.row_count();
    let cols = table.column_count();

    if rows == 0 {
        return Err(PipelineError::Input("table has a header but no data rows".to_string()));
    }

    let missing: Vec<MissingColumn> = (0..cols)
        .filter_map(|col| {
            let count = (0..rows).filter(|&row| is_missing(table.cell(row, col))).count();
            (count > 0).then(|| MissingColumn {
                name: table.columns()[col].clone(),
                count,
            })
        })
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::MissingValue { columns: missing });
    }

    let mut data = vec![0.0; rows * cols];
    for col in 0..cols {
        for row in 0..rows {
            let raw = table.cell(row, col).unwrap_or_default();
            data[row * cols + col] = parse_number(raw).ok_or_else(|| PipelineError::TypeCoercion {
                column: table.columns()[col].clone(),
                row: row + 1,
                value: raw.to_string(),
            })?;
        }
    }

    debug!(rows = rows, cols = cols, "Coerced upload to feature matrix");

    Ok(FeatureMatrix::new(table.columns().to_vec(), data))
}
