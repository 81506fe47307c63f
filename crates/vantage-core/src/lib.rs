pub mod error;
pub mod event;
pub mod manager;
pub mod plugin_system;
pub mod schema;
pub mod storage;

// Re-export key public types/traits for easier use by the binary and plugins
pub use error::{Error, Result};
pub use event::{EventBus, Subscription, ValidationEvent};
pub use manager::{ManagerCore, ProgressSink, RunControl, RunMode, ValidationError};
pub use plugin_system::{
    CheckPlugin, ContextPlugin, Plugin, PluginCrash, PluginRegistry, PluginResult, ResultorPlugin,
    RunCallback, SelectorPlugin, StageOutcome,
};
pub use schema::{InstanceId, SchemaDocument, StageLocation, ValidationSchema};
pub use storage::{DocumentFormat, ValidatorConfig};

// Shared fixtures for the module tests
#[cfg(test)]
mod tests;
