use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::manager::RunMode;
use crate::storage::error::StorageError;
use crate::storage::format;

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Settings for a validator front-end; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub run_mode: RunMode,
    /// Print every progress change while running
    #[serde(default = "default_true")]
    pub print_progress: bool,
    /// Treat a completed but failed run as an error exit
    #[serde(default = "default_true")]
    pub fail_on_check_failure: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            run_mode: RunMode::default(),
            print_progress: true,
            fail_on_check_failure: true,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from disk
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let config: ValidatorConfig = format::read_document(path)?;
        log::debug!("Loaded validator config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        format::write_document(path, self)
    }
}
