pub mod dispatcher;
pub mod types;

/// Type for subscription identifiers
pub type EventId = u64;

/// Re-export important types
pub use dispatcher::{EventBus, EventHandler, Subscription};
pub use types::{EventKind, StageAction, StageEvent, ValidationEvent};

// Test module declaration
#[cfg(test)]
mod tests;
