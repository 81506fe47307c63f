pub mod document;
pub mod error;
mod merge;
pub mod model;

// Re-export important types
pub use document::{CheckDocument, PluginDocument, SchemaDocument};
pub use error::SchemaError;
pub use model::{
    CheckGroup, InstanceId, PluginDescriptor, StageLocation, StageNode, StageRecord,
    ValidationSchema,
};

// Test module declaration
#[cfg(test)]
mod tests;
