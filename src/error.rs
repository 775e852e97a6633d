use std::path::PathBuf;

use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid Stata file: {0}")]
    InvalidFormat(String),

    #[error("Unsupported Stata release: {0}")]
    UnsupportedVersion(u16),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Error::InvalidFormat(message.into())
    }
}
