use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schema::error::SchemaError;
use crate::schema::model::StageRecord;
use crate::storage::format::{self, DocumentFormat};

fn default_enabled() -> bool {
    true
}

fn default_data() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Declarative entry for a context, selector or resultor stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDocument {
    /// Registry key of the plugin
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_data")]
    pub data: Value,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<StageRecord>,
}

impl PluginDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            data: default_data(),
            progress: 0.0,
            last_result: None,
        }
    }
}

/// Declarative entry for a check-group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDocument {
    /// Registry key of the check plugin
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_data")]
    pub data: Value,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<StageRecord>,
    #[serde(default)]
    pub stop_if_fix_failed: bool,
    #[serde(default)]
    pub pause_if_fix_failed: bool,
    pub context_plugin: PluginDocument,
    pub selector_plugins: Vec<PluginDocument>,
    #[serde(default)]
    pub resultor_plugins: Vec<PluginDocument>,
}

impl CheckDocument {
    /// The check stage's own entry, without the nested stages
    pub fn plugin_document(&self) -> PluginDocument {
        PluginDocument {
            name: self.name.clone(),
            enabled: self.enabled,
            data: self.data.clone(),
            progress: self.progress,
            last_result: self.last_result.clone(),
        }
    }
}

/// Declarative description of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    pub context_plugin: PluginDocument,
    pub check_plugins: Vec<CheckDocument>,
    #[serde(default)]
    pub resultor_plugins: Vec<PluginDocument>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub validation_passed: bool,
    #[serde(default)]
    pub finished: (bool, String),
    #[serde(default)]
    pub send_request: bool,
}

impl SchemaDocument {
    /// Structural checks serde cannot express
    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        if self.check_plugins.is_empty() {
            return Err(SchemaError::NoCheckPlugins);
        }
        Ok(())
    }

    /// Parse and validate a document held as a JSON value
    pub fn from_value(value: Value) -> std::result::Result<Self, SchemaError> {
        let document: SchemaDocument =
            serde_json::from_value(value).map_err(|e| SchemaError::InvalidDocument {
                message: e.to_string(),
            })?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_value(&self) -> std::result::Result<Value, SchemaError> {
        serde_json::to_value(self).map_err(|e| SchemaError::InvalidDocument {
            message: e.to_string(),
        })
    }

    /// Parse and validate a document from text in the given format
    pub fn parse(data: &str, format: DocumentFormat) -> Result<Self> {
        let document: SchemaDocument = format::deserialize(data, format)?;
        document.validate()?;
        Ok(document)
    }

    /// Load a document, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Self> {
        let document: SchemaDocument = format::read_document(path)?;
        document.validate()?;
        log::debug!("Loaded schema document '{}' from {}", document.name, path.display());
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        format::write_document(path, self)?;
        Ok(())
    }
}
