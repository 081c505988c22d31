//! Delimited-text input and output.
//!
//! Uploads are read with the first row as the header. Result, template and
//! demo tables are written with the same delimiter rules.

use crate::error::{PipelineError, PipelineResult};
use crate::schema::FeatureSchema;
use crate::types::result::ResultTable;
use crate::types::table::RawTable;
use anyhow::Result;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Field delimiter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Detect from the header line
    Auto,
    Byte(u8),
}

impl Delimiter {
    /// Parse `"auto"`, a single character, or one of `tab`/`comma`/`semicolon`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "auto" => Ok(Delimiter::Auto),
            "tab" | "\t" => Ok(Delimiter::Byte(b'\t')),
            "comma" => Ok(Delimiter::Byte(b',')),
            "semicolon" => Ok(Delimiter::Byte(b';')),
            other if other.len() == 1 && other.is_ascii() => Ok(Delimiter::Byte(other.as_bytes()[0])),
            other => anyhow::bail!("unsupported delimiter {:?}", other),
        }
    }

    /// Concrete byte for a file whose first line is `header`.
    pub fn resolve(self, header: &str) -> u8 {
        match self {
            Delimiter::Byte(b) => b,
            Delimiter::Auto => sniff_delimiter(header),
        }
    }

    /// Byte used when writing; auto writes commas.
    pub fn for_output(self) -> u8 {
        match self {
            Delimiter::Byte(b) => b,
            Delimiter::Auto => b',',
        }
    }
}

/// Most frequent of `;`, `,` and tab in the header line; comma on a tie.
pub fn sniff_delimiter(header: &str) -> u8 {
    let count = |c: char| header.chars().filter(|&h| h == c).count();
    let candidates = [(b',', count(',')), (b';', count(';')), (b'\t', count('\t'))];
    candidates
        .iter()
        .fold((b',', 0), |best, &(b, n)| if n > best.1 { (b, n) } else { best })
        .0
}

/// Read a delimited table from bytes.
///
/// Rows shorter than the header get missing cells. A row longer than the
/// header is rejected with its line number.
pub fn read_table(bytes: &[u8], delimiter: u8) -> PipelineResult<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    if columns.is_empty() || columns.iter().all(String::is_empty) {
        return Err(PipelineError::Input("file has no header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > columns.len() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(PipelineError::Input(format!(
                "line {} has {} fields but the header has {}",
                line,
                record.len(),
                columns.len()
            )));
        }
        let mut row: Vec<Option<String>> = record.iter().map(|f| Some(f.to_string())).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(RawTable::new(columns, rows))
}

/// Read a delimited table from a file.
pub fn read_table_path<P: AsRef<Path>>(path: P, delimiter: Delimiter) -> PipelineResult<RawTable> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| PipelineError::Input(format!("cannot read {}: {}", path.display(), e)))?;
    let header = first_line(&bytes);
    read_table(&bytes, delimiter.resolve(&header))
}

fn first_line(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == b'\n').unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Format a value the way it was most likely written: integers without a
/// fractional part.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Write the result table: feature columns then prediction columns.
pub fn write_result_table<W: std::io::Write>(
    writer: W,
    table: &ResultTable,
    delimiter: u8,
    include_dropout_probability: bool,
) -> csv::Result<()> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    writer.write_record(table.header(include_dropout_probability))?;

    for (values, prediction) in table.iter() {
        let mut record: Vec<String> = values.iter().map(|&v| format_value(v)).collect();
        record.push(prediction.class_index().to_string());
        record.push(prediction.label().to_string());
        record.push(format!("{:.6}", prediction.graduate_probability));
        if include_dropout_probability {
            record.push(format!("{:.6}", prediction.dropout_probability));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the result table to `path`, creating parent directories.
pub fn write_result_table_path<P: AsRef<Path>>(
    path: P,
    table: &ResultTable,
    delimiter: u8,
    include_dropout_probability: bool,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    write_result_table(file, table, delimiter, include_dropout_probability)?;
    Ok(())
}

/// Write the header-only template for `schema`.
pub fn write_template<W: std::io::Write>(writer: W, schema: &FeatureSchema, delimiter: u8) -> csv::Result<()> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    writer.write_record(schema.template_columns())?;
    writer.flush()?;
    Ok(())
}

/// One-row table with every schema column set to `0`.
pub fn demo_table(schema: &FeatureSchema) -> RawTable {
    let columns = schema.template_columns();
    let row = vec!["0"; columns.len()];
    RawTable::from_records(columns, [row])
}

/// `<output_dir>/<input stem>_predictions.csv`
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    output_dir.join(format!("{}_predictions.csv", stem))
}
