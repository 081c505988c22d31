//! Table types for the forward data flow:
//! `RawTable` → `ValidatedTable` → `FeatureMatrix`.

use crate::models::ModelError;
use std::collections::HashMap;

/// An uploaded table: named columns with untyped cells.
///
/// Cells are `None` when a row is shorter than the header.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Create a table from a header row and data rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from string records; every present field becomes `Some`.
    pub fn from_records<C, R, S>(columns: C, records: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns.into_iter().map(Into::into).collect();
        let rows = records
            .into_iter()
            .map(|record| record.into_iter().map(|v| Some(v.into())).collect())
            .collect();
        Self { columns, rows }
    }

    /// Header names as supplied.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `(row, column)`; `None` when absent.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Index of a column by name, ignoring surrounding whitespace.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns.iter().position(|c| c.trim() == name)
    }

    /// Same table with columns laid out in `order` (indices into the current header).
    pub fn reordered(&self, order: &[usize]) -> Self {
        let columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| order.iter().map(|&i| row.get(i).cloned().flatten()).collect())
            .collect();
        Self { columns, rows }
    }
}

/// A column-validated view over a `RawTable`.
///
/// Holds exactly the schema columns, in schema order (or in upload order
/// for a count-only schema). Cells are still untyped; value validation
/// turns this into a `FeatureMatrix`.
#[derive(Debug, Clone)]
pub struct ValidatedTable<'a> {
    raw: &'a RawTable,
    columns: Vec<String>,
    source: Vec<usize>,
    dropped: Vec<String>,
}

impl<'a> ValidatedTable<'a> {
    pub(crate) fn new(
        raw: &'a RawTable,
        columns: Vec<String>,
        source: Vec<usize>,
        dropped: Vec<String>,
    ) -> Self {
        debug_assert_eq!(columns.len(), source.len());
        Self {
            raw,
            columns,
            source,
            dropped,
        }
    }

    /// Column names in model order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.raw.row_count()
    }

    /// Cell at `(row, column)` where `column` indexes the validated order.
    pub fn cell(&self, row: usize, column: usize) -> Option<&'a str> {
        self.raw.cell(row, self.source[column])
    }

    /// Upload columns discarded under the drop-extras policy.
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped
    }
}

/// Dense row-major `f64` matrix with named columns.
///
/// Column `i` always holds the feature named `columns()[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
    rows: usize,
}

impl FeatureMatrix {
    /// Create a matrix from column names and row-major data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` is not a multiple of `columns.len()`.
    pub fn new(columns: Vec<String>, data: Vec<f64>) -> Self {
        let cols = columns.len();
        assert!(
            cols > 0 && data.len() % cols == 0,
            "data length {} is not a multiple of column count {}",
            data.len(),
            cols
        );
        let rows = data.len() / cols;
        Self {
            columns,
            data,
            rows,
        }
    }

    /// Build from per-row vectors.
    ///
    /// # Panics
    ///
    /// Panics if any row's width differs from the column count.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Self {
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), columns.len(), "row {} has the wrong width", i);
        }
        let data = rows.iter().flatten().copied().collect();
        Self::new(columns, data)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols() + col]
    }

    /// One sample.
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        let cols = self.cols();
        &self.data[row * cols..(row + 1) * cols]
    }

    /// Raw row-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Row-major storage narrowed to `f32` for runtimes that take single precision.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32).collect()
    }

    /// New matrix whose columns follow `names`.
    ///
    /// Names match after trimming surrounding whitespace on both sides, the
    /// same rule header validation uses.
    pub fn select(&self, names: &[String]) -> Result<FeatureMatrix, ModelError> {
        let index: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.trim(), i))
            .collect();

        let order = names
            .iter()
            .map(|name| {
                index
                    .get(name.trim())
                    .copied()
                    .ok_or_else(|| ModelError::MissingFeature(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = Vec::with_capacity(self.rows * order.len());
        for row in 0..self.rows {
            let values = self.row(row);
            data.extend(order.iter().map(|&i| values[i]));
        }

        Ok(FeatureMatrix {
            columns: names.iter().map(|n| n.trim().to_string()).collect(),
            data,
            rows: self.rows,
        })
    }
}
