//! # Vantage Core Validation Errors
//!
//! Defines [`ValidationError`], the ways a validation run can abort.
//!
//! Non-fatal check failures are not errors: they only turn the run's
//! final outcome into a failure.
use thiserror::Error;

use crate::event::StageAction;

#[derive(Debug, Error)]
pub enum ValidationError {
    /// A stage could not produce an outcome
    #[error("Plugin '{plugin}' at {stage} crashed during {action}: {message}")]
    PluginCrashed {
        stage: String,
        plugin: String,
        action: StageAction,
        message: String,
    },

    /// A context, selector or resultor reported failure
    #[error("Plugin '{plugin}' at {stage} failed during {action}: {message}")]
    StageFailed {
        stage: String,
        plugin: String,
        action: StageAction,
        message: String,
    },

    /// Check and fix both failed on a group configured to stop
    #[error("Fix of '{plugin}' at {stage} failed: {message}")]
    FixFailed {
        stage: String,
        plugin: String,
        message: String,
    },

    #[error("No check plugin enabled")]
    NoCheckGroupEnabled,

    #[error("No selector plugin enabled at {stage}")]
    NoSelectorEnabled { stage: String },

    #[error("Stopped validation")]
    Stopped,

    #[error("Progress sink failed: {0}")]
    ProgressSink(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
