//! # Vantage Core Schema Errors
//!
//! Defines [`SchemaError`], covering document validation, stage path
//! resolution and partial updates of a live schema.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema must declare at least one check plugin")]
    NoCheckPlugins,

    #[error("Invalid schema document: {message}")]
    InvalidDocument { message: String },

    #[error("Invalid stage path '{path}'")]
    InvalidStagePath { path: String },

    #[error("No stage at '{path}' in this schema")]
    UnknownStage { path: String },
}
