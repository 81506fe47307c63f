//! # Vantage Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], raised while registering plugin factories
//! or instantiating plugins for a schema.
use thiserror::Error;

use crate::plugin_system::traits::PluginKind;

#[derive(Debug, Error)]
pub enum PluginSystemError {
    #[error("Plugin '{name}' is not registered")]
    PluginNotFound { name: String },

    #[error("Plugin '{name}' is registered as a {found} plugin, expected a {expected} plugin")]
    KindMismatch {
        name: String,
        expected: PluginKind,
        found: PluginKind,
    },

    #[error("Plugin '{name}' already exists in the registry")]
    AlreadyRegistered { name: String },
}
