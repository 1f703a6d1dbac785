//! # Plugkit Core Storage System Errors
//!
//! Defines [`StorageSystemError`], raised while reading or writing the
//! plugin settings file.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("I/O error during operation '{operation}' on path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization of '{}' from '{format}' failed: {source}", .path.display())]
    DeserializationError {
        path: PathBuf,
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format: {}", .path.display())]
    UnsupportedConfigFormat { path: PathBuf },
}
