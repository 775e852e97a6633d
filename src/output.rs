use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::metadata::NormalizedMetadata;
use crate::table::DataTable;
use crate::types::{HeaderStyle, Result};

const METADATA_HEADERS: [&str; 9] = [
    "Column Labels",
    "Column Names",
    "Value Labels",
    "Variable Value Labels",
    "Original Variable Types",
    "Readstat Variable Types",
    "Variable Alignment",
    "Variable Measure",
    "Variable to Label",
];

/// Header row of the metadata table for the given naming style
pub fn metadata_headers(style: HeaderStyle) -> [&'static str; 9] {
    let mut headers = METADATA_HEADERS;
    if style == HeaderStyle::VariableLabels {
        headers[0] = "Variable Labels";
    }
    headers
}

/// Paths of the three CSV outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub data: PathBuf,
    pub metadata: PathBuf,
    pub decoded: PathBuf,
}

impl OutputPaths {
    /// Derive output paths from the input's base file name
    pub fn new(input: &Path, output_dir: &Path) -> Self {
        let stem = output_stem(input);
        Self {
            data: output_dir.join(format!("{}.csv", stem)),
            metadata: output_dir.join(format!("{}_metadata.csv", stem)),
            decoded: output_dir.join(format!("{}_decoded.csv", stem)),
        }
    }
}

/// File name without its final extension, or the whole name when it has none
pub fn output_stem(input: &Path) -> String {
    input
        .file_stem()
        .or_else(|| input.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Write a data table as CSV with a header row
pub fn write_table_csv(table: &DataTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_names())?;
    for index in 0..table.n_rows() {
        writer.write_record(table.row(index).map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the normalized metadata table as CSV
pub fn write_metadata_csv(
    metadata: &NormalizedMetadata,
    style: HeaderStyle,
    path: &Path,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(metadata_headers(style))?;
    for row in &metadata.rows {
        writer.write_record(row.fields())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a value as pretty JSON to a file
pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Write a value as pretty JSON string
pub fn to_json_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Write a value as pretty JSON to stdout
pub fn write_json_stdout<T: Serialize>(value: &T) -> Result<()> {
    let json = to_json_string(value)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)?;
    Ok(())
}
