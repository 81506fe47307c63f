//! # Vantage Core Storage Errors
//!
//! Defines [`StorageError`], raised while reading or writing schema
//! documents and validator configuration files.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported document format for path: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Deserialization from '{format}' failed: {message}")]
    Deserialize { format: String, message: String },

    #[error("Serialization to '{format}' failed: {message}")]
    Serialize { format: String, message: String },
}

// Helper for creating Io errors, ensuring path is always included.
impl StorageError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        StorageError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}
