//! Generic stages over JSON documents.
//!
//! Every stage is configured through its descriptor's `data` map; see the
//! individual plugins for the keys they read. [`register`] adds all of them
//! to a [`PluginRegistry`] under their `*_KEY` constants.

mod checks;
mod contexts;
mod resultors;
mod selectors;

use vantage_core::plugin_system::{PluginData, PluginSystemError};
use vantage_core::PluginRegistry;

pub use checks::{NonEmptyCheck, RequiredKeysCheck};
pub use contexts::{InheritContext, JsonFileContext};
pub use resultors::{JsonReportResultor, LogReportResultor};
pub use selectors::JsonPointerSelector;

pub const JSON_FILE_KEY: &str = "json_file";
pub const INHERIT_KEY: &str = "inherit";
pub const JSON_POINTER_KEY: &str = "json_pointer";
pub const REQUIRED_KEYS_KEY: &str = "required_keys";
pub const NON_EMPTY_KEY: &str = "non_empty";
pub const LOG_REPORT_KEY: &str = "log_report";
pub const JSON_REPORT_KEY: &str = "json_report";

/// Register every stage of this crate
pub fn register(registry: &mut PluginRegistry) -> Result<(), PluginSystemError> {
    log::info!("Registering core stages");
    registry.register_context(JSON_FILE_KEY, JsonFileContext::default)?;
    registry.register_context(INHERIT_KEY, InheritContext::default)?;
    registry.register_selector(JSON_POINTER_KEY, JsonPointerSelector::default)?;
    registry.register_check(REQUIRED_KEYS_KEY, RequiredKeysCheck::default)?;
    registry.register_check(NON_EMPTY_KEY, NonEmptyCheck::default)?;
    registry.register_resultor(LOG_REPORT_KEY, LogReportResultor::default)?;
    registry.register_resultor(JSON_REPORT_KEY, JsonReportResultor::default)?;
    Ok(())
}

/// String value of `key` in a stage's data map
fn data_str<'a>(data: &'a PluginData, key: &str) -> Option<&'a str> {
    data.get(key).and_then(|value| value.as_str())
}
