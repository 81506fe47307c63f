use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::storage::error::StorageError;

/// Supported document file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl DocumentFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            DocumentFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            DocumentFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(DocumentFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(DocumentFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(DocumentFormat::Toml),
                _ => None,
            })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Json => "JSON",
            #[cfg(feature = "yaml-config")]
            DocumentFormat::Yaml => "YAML",
            #[cfg(feature = "toml-config")]
            DocumentFormat::Toml => "TOML",
        };
        f.write_str(name)
    }
}

/// Serialize to string based on format
pub fn serialize<T: Serialize>(value: &T, format: DocumentFormat) -> Result<String, StorageError> {
    let result = match format {
        DocumentFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        #[cfg(feature = "yaml-config")]
        DocumentFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        #[cfg(feature = "toml-config")]
        DocumentFormat::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
    };
    result.map_err(|message| StorageError::Serialize {
        format: format.to_string(),
        message,
    })
}

/// Deserialize from string based on format
pub fn deserialize<T: DeserializeOwned>(data: &str, format: DocumentFormat) -> Result<T, StorageError> {
    let result = match format {
        DocumentFormat::Json => serde_json::from_str(data).map_err(|e| e.to_string()),
        #[cfg(feature = "yaml-config")]
        DocumentFormat::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
        #[cfg(feature = "toml-config")]
        DocumentFormat::Toml => toml::from_str(data).map_err(|e| e.to_string()),
    };
    result.map_err(|message| StorageError::Deserialize {
        format: format.to_string(),
        message,
    })
}

/// Read and parse a file, picking the format from its extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| StorageError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| StorageError::io(e, "read_to_string", path.to_path_buf()))?;
    deserialize(&content, format)
}

/// Serialize and write a file, picking the format from its extension
pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| StorageError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = serialize(value, format)?;

    // Ensure the directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageError::io(e, "create_dir_all", parent.to_path_buf()))?;
    }
    std::fs::write(path, content).map_err(|e| StorageError::io(e, "write", path.to_path_buf()))
}
