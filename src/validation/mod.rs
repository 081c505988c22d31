//! Upload validation: column set first, then cell values.

pub mod columns;
pub mod values;

pub use columns::{align_columns, validate_columns, ColumnPolicy, ColumnValidation};
pub use values::{is_missing, parse_number, validate_and_coerce};
