pub mod stata;

use std::path::Path;

use crate::table::DataTable;
use crate::types::{FileFormat, FileMetadata, ReadOptions, Result};

/// A data table together with the metadata describing it
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: DataTable,
    pub metadata: FileMetadata,
}

/// Common trait for data file readers
pub trait DataReader {
    /// Read the whole file into memory
    fn read(&mut self, options: &ReadOptions) -> Result<Dataset>;
}

/// Create a reader for the given file path
pub fn create_reader(path: &Path) -> Result<Box<dyn DataReader>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let format = FileFormat::from_extension(ext).ok_or_else(|| {
        crate::error::Error::UnsupportedFormat(format!(
            "Unsupported file extension: .{}",
            ext
        ))
    })?;

    match format {
        FileFormat::Stata => Ok(Box::new(stata::StataReader::new(path)?)),
    }
}
