use async_trait::async_trait;
use serde_json::{Map, Value};
use vantage_core::plugin_system::{Payload, PluginData};
use vantage_core::{CheckPlugin, Plugin, PluginResult, StageOutcome};

use crate::contexts::write_back;
use crate::{NON_EMPTY_KEY, REQUIRED_KEYS_KEY, data_str};

/// Requires every selected object to carry the keys listed in `data.keys`.
///
/// The selection may be one object or an array of objects. `fix` fills
/// missing keys from `data.defaults` and writes the filled selection back
/// into the context's JSON file at `data.pointer` (the whole document when
/// unset), so it should match the pointer of the group's selector.
/// Groups sharing the file in the same run still see the document as it
/// was loaded.
#[derive(Debug, Default)]
pub struct RequiredKeysCheck;

impl RequiredKeysCheck {
    fn required(data: &PluginData) -> Vec<&str> {
        data.get("keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// The selected objects, or `None` if the selection has another shape
    fn objects(selected: &Payload) -> Option<Vec<&Map<String, Value>>> {
        match selected {
            Value::Object(object) => Some(vec![object]),
            Value::Array(items) => items.iter().map(Value::as_object).collect(),
            _ => None,
        }
    }

    fn missing<'a>(required: &[&'a str], objects: &[&Map<String, Value>]) -> Vec<&'a str> {
        let mut missing: Vec<&str> = Vec::new();
        for object in objects {
            for key in required {
                if !object.contains_key(*key) && !missing.contains(key) {
                    missing.push(*key);
                }
            }
        }
        missing
    }
}

#[async_trait]
impl Plugin for RequiredKeysCheck {
    fn name(&self) -> &str {
        REQUIRED_KEYS_KEY
    }

    fn description(&self) -> &str {
        "Checks that selected objects contain the required keys"
    }
}

#[async_trait]
impl CheckPlugin for RequiredKeysCheck {
    async fn check(
        &self,
        data: &PluginData,
        _context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        let Some(objects) = Self::objects(selected) else {
            return Ok(StageOutcome::failed("Selection is not an object", selected.clone()));
        };
        let missing = Self::missing(&Self::required(data), &objects);
        if missing.is_empty() {
            Ok(StageOutcome::passed("All required keys present", selected.clone()))
        } else {
            Ok(StageOutcome::failed(
                format!("Missing key(s): {}", missing.join(", ")),
                selected.clone(),
            ))
        }
    }

    async fn fix(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        let empty = Map::new();
        let defaults = data.get("defaults").and_then(Value::as_object).unwrap_or(&empty);
        let required = Self::required(data);

        let mut fixed = selected.clone();
        let objects: Vec<&mut Map<String, Value>> = match &mut fixed {
            Value::Object(object) => vec![object],
            Value::Array(items) => items.iter_mut().filter_map(Value::as_object_mut).collect(),
            _ => Vec::new(),
        };
        if objects.is_empty() {
            return Ok(StageOutcome::failed("Selection is not an object", selected.clone()));
        }

        let mut filled = 0;
        for object in objects {
            for key in &required {
                if object.contains_key(*key) {
                    continue;
                }
                let Some(default) = defaults.get(*key) else {
                    return Ok(StageOutcome::failed(
                        format!("No default for missing key '{}'", key),
                        selected.clone(),
                    ));
                };
                object.insert(key.to_string(), default.clone());
                filled += 1;
            }
        }
        if filled == 0 {
            return Ok(StageOutcome::failed("Nothing to fill", selected.clone()));
        }

        let Some(path) = context.and_then(|context| context.get("path")).and_then(Value::as_str)
        else {
            return Ok(StageOutcome::failed(
                "No context file to write the fix to",
                selected.clone(),
            ));
        };
        let pointer = data_str(data, "pointer").unwrap_or("");
        if let Err(message) = write_back(path, pointer, fixed.clone()).await {
            return Ok(StageOutcome::failed(message, selected.clone()));
        }
        log::debug!("Filled {} missing key(s) from defaults into '{}'", filled, path);
        Ok(StageOutcome::passed(format!("Filled {} missing key(s)", filled), fixed))
    }
}

/// Fails on an empty array, object or string, and on null
#[derive(Debug, Default)]
pub struct NonEmptyCheck;

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[async_trait]
impl Plugin for NonEmptyCheck {
    fn name(&self) -> &str {
        NON_EMPTY_KEY
    }

    fn description(&self) -> &str {
        "Checks that the selection is not empty"
    }
}

#[async_trait]
impl CheckPlugin for NonEmptyCheck {
    async fn check(
        &self,
        _data: &PluginData,
        _context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        if is_empty(selected) {
            Ok(StageOutcome::failed("Selection is empty", selected.clone()))
        } else {
            Ok(StageOutcome::passed("Selection is not empty", selected.clone()))
        }
    }

    async fn fix(
        &self,
        _data: &PluginData,
        _context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        Ok(StageOutcome::failed("An empty selection cannot be fixed", selected.clone()))
    }
}
