pub mod control;
pub mod error;
mod executor;
pub mod manager_core;
mod plan;
mod progress;
pub mod run_mode;
pub mod sink;

// Re-export important types
pub use control::RunControl;
pub use error::ValidationError;
pub use manager_core::ManagerCore;
pub use run_mode::RunMode;
pub use sink::ProgressSink;

// Test module declaration
#[cfg(test)]
mod tests;
