use std::path::Path;

use async_trait::async_trait;
use serde_json::{Value, json};
use vantage_core::plugin_system::{Payload, PluginData};
use vantage_core::{ContextPlugin, Plugin, PluginResult, RunCallback, StageOutcome};

use crate::{INHERIT_KEY, JSON_FILE_KEY, data_str};

/// Opens the JSON file at `data.path` and runs the nested stages with
/// `{"path": ..., "document": ...}` as their context
#[derive(Debug, Default)]
pub struct JsonFileContext;

#[async_trait]
impl Plugin for JsonFileContext {
    fn name(&self) -> &str {
        JSON_FILE_KEY
    }

    fn description(&self) -> &str {
        "Loads a JSON document from data.path for the nested stages"
    }
}

#[async_trait]
impl ContextPlugin for JsonFileContext {
    async fn check(&self, data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        let Some(path) = data_str(data, "path") else {
            return Ok(StageOutcome::failed("json_file requires data.path", ()));
        };
        if !Path::new(path).is_file() {
            return Ok(StageOutcome::failed(format!("File '{}' not found", path), ()));
        }
        Ok(StageOutcome::passed(format!("File '{}' exists", path), ()))
    }

    async fn setup(
        &self,
        data: &PluginData,
        mut run_callback: RunCallback<'_>,
        _parent: Option<&Payload>,
    ) -> PluginResult<Payload> {
        let Some(path) = data_str(data, "path") else {
            return Ok(StageOutcome::failed("json_file requires data.path", Value::Null));
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                return Ok(StageOutcome::failed(
                    format!("Failed to read '{}': {}", path, e),
                    Value::Null,
                ));
            }
        };
        let document: Value = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                return Ok(StageOutcome::failed(
                    format!("'{}' is not valid JSON: {}", path, e),
                    Value::Null,
                ));
            }
        };
        log::debug!("Loaded '{}' for nested stages", path);

        let context = json!({ "path": path, "document": document });
        if let Err(aborted) = run_callback.run(context.clone()).await {
            return Ok(StageOutcome::failed(aborted.to_string(), context));
        }
        Ok(StageOutcome::passed(format!("Validated '{}'", path), context))
    }

    async fn on_exit(&self, _data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        Ok(StageOutcome::passed("Closed", ()))
    }
}

/// Replace the value at `pointer` in the JSON file at `path`.
///
/// Reads the file fresh so earlier writes of the same run are kept.
pub(crate) async fn write_back(path: &str, pointer: &str, value: Value) -> Result<(), String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let mut document: Value = serde_json::from_str(&content)
        .map_err(|e| format!("'{}' is not valid JSON: {}", path, e))?;
    let Some(slot) = document.pointer_mut(pointer) else {
        return Err(format!("Pointer '{}' matched nothing in '{}'", pointer, path));
    };
    *slot = value;

    let content = serde_json::to_string_pretty(&document)
        .map_err(|e| format!("Failed to serialize '{}': {}", path, e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| format!("Failed to write '{}': {}", path, e))?;
    log::debug!("Wrote fix to '{}' at '{}'", path, pointer);
    Ok(())
}

/// Hands the parent context to the nested stages unchanged
#[derive(Debug, Default)]
pub struct InheritContext;

#[async_trait]
impl Plugin for InheritContext {
    fn name(&self) -> &str {
        INHERIT_KEY
    }

    fn description(&self) -> &str {
        "Passes the parent context through"
    }
}

#[async_trait]
impl ContextPlugin for InheritContext {
    async fn check(&self, _data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        Ok(StageOutcome::passed("Ready", ()))
    }

    async fn setup(
        &self,
        _data: &PluginData,
        mut run_callback: RunCallback<'_>,
        parent: Option<&Payload>,
    ) -> PluginResult<Payload> {
        let context = parent.cloned().unwrap_or(Value::Null);
        if let Err(aborted) = run_callback.run(context.clone()).await {
            return Ok(StageOutcome::failed(aborted.to_string(), context));
        }
        Ok(StageOutcome::passed("Inherited parent context", context))
    }

    async fn on_exit(&self, _data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        Ok(StageOutcome::passed("Done", ()))
    }
}
