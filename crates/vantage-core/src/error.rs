//! # Vantage Core Errors
//!
//! Crate-wide error type aggregating the subsystem errors.
//!
//! Each subsystem defines its own `thiserror` enum in its `error.rs`; this
//! module wraps them in [`Error`] so callers of the public API deal with a
//! single result type.
use thiserror::Error as ThisError;

use crate::manager::error::ValidationError;
use crate::plugin_system::error::PluginSystemError;
use crate::schema::error::SchemaError;
use crate::storage::error::StorageError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Plugin registry / instantiation error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Schema construction, validation or update error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Document or config storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A validation run aborted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Whether this error is the cooperative stop of a run
    pub fn is_stopped(&self) -> bool {
        matches!(self, Error::Validation(ValidationError::Stopped))
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
