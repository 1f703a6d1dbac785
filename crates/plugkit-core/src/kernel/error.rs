//! # Plugkit Core Kernel Errors
//!
//! Defines the top-level [`Error`] returned by the public fallible APIs of the
//! crate. Subsystem errors convert into it through `#[from]` so that callers
//! can propagate everything with `?` and still match on the typed cause.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::plugin_system::error::PluginSystemError;
use crate::storage::error::StorageSystemError;

/// Custom error type for the plugin runtime
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        message: String,
    },
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

// Helper to create an I/O error with context, wraps StorageSystemError::Io
impl Error {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        })
    }

    /// Returns the command-line error wrapped in this error, if any.
    pub fn as_options_error(&self) -> Option<&crate::plugin_system::error::OptionsError> {
        match self {
            Error::PluginSystem(PluginSystemError::Options(e)) => Some(e),
            _ => None,
        }
    }
}
