pub mod error;
pub mod registry;
pub mod traits;

// Re-export important types
pub use error::PluginSystemError;
pub use registry::{PluginFactory, PluginRegistry};
pub use traits::{
    CheckPlugin, ContextPlugin, Payload, Plugin, PluginCrash, PluginData, PluginKind, PluginResult,
    ResultorPlugin, RunAborted, RunCallback, RunFuture, SelectorPlugin, StageOutcome, StageRole,
};

// Test module declaration
#[cfg(test)]
mod tests;
