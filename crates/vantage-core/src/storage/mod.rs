pub mod config;
pub mod error;
pub mod format;

// Re-export important types
pub use config::ValidatorConfig;
pub use error::StorageError;
pub use format::DocumentFormat;

// Test module declaration
#[cfg(test)]
mod tests;
