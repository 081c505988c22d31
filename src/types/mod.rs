//! Table, prediction and report types

pub mod report;
pub mod result;
pub mod table;

pub use report::BatchReport;
pub use result::{Outcome, PredictionResult, ResultTable};
pub use table::{FeatureMatrix, RawTable, ValidatedTable};
