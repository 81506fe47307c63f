//! Structural partial update of a live [`ValidationSchema`].
//!
//! The incoming document is validated on its own first. Values are then
//! copied onto the live state for keys the caller actually sent; list
//! lengths and map key sets of the live state never change.

use serde_json::{Map, Value};

use crate::schema::document::{CheckDocument, PluginDocument, SchemaDocument};
use crate::schema::error::SchemaError;
use crate::schema::model::{CheckGroup, PluginDescriptor, ValidationSchema};

impl ValidationSchema {
    /// Merge a partial schema document into this schema.
    ///
    /// Returns how many values changed. Applying the same partial twice
    /// yields 0 the second time and emits no further notifications.
    pub fn update(&mut self, partial: &Value) -> Result<usize, SchemaError> {
        let incoming = SchemaDocument::from_value(partial.clone())?.to_value()?;
        let mut current = self.to_document().to_value()?;

        let changed = merge_schema(&mut current, &incoming, partial);
        if changed == 0 {
            return Ok(0);
        }

        let merged: SchemaDocument =
            serde_json::from_value(current).map_err(|e| SchemaError::InvalidDocument {
                message: e.to_string(),
            })?;
        self.apply(merged);
        log::debug!("Applied {} change(s) to schema '{}'", changed, self.name);
        Ok(changed)
    }

    fn apply(&mut self, document: SchemaDocument) {
        self.name = document.name;
        self.uuid = document.uuid;
        self.send_request = document.send_request;
        self.validation_passed = document.validation_passed;

        apply_plugin(&mut self.context, document.context_plugin);
        for (group, doc) in self.check_groups.iter_mut().zip(document.check_plugins) {
            apply_group(group, doc);
        }
        for (resultor, doc) in self.resultors.iter_mut().zip(document.resultor_plugins) {
            apply_plugin(resultor, doc);
        }

        self.set_progress(document.progress);
        if self.finished != document.finished {
            let (success, message) = document.finished;
            self.set_finished(success, message);
        }
    }
}

fn apply_plugin<P: ?Sized>(live: &mut PluginDescriptor<P>, document: PluginDocument) {
    live.enabled = document.enabled;
    live.data = document.data;
    live.progress = document.progress;
    live.last_result = document.last_result;
}

fn apply_group(group: &mut CheckGroup, document: CheckDocument) {
    apply_plugin(&mut group.check, document.plugin_document());
    group.stop_if_fix_failed = document.stop_if_fix_failed;
    group.pause_if_fix_failed = document.pause_if_fix_failed;
    apply_plugin(&mut group.context, document.context_plugin);
    for (selector, doc) in group.selectors.iter_mut().zip(document.selector_plugins) {
        apply_plugin(selector, doc);
    }
    for (resultor, doc) in group.resultors.iter_mut().zip(document.resultor_plugins) {
        apply_plugin(resultor, doc);
    }
}

/// Keys of `present` that both sides carry, with the matching values
fn shared_keys<'a>(
    current: &Value,
    incoming: &'a Value,
    present: &'a Value,
) -> Vec<(&'a str, &'a Value, &'a Value)> {
    let (Some(incoming), Some(present)) = (incoming.as_object(), present.as_object()) else {
        return Vec::new();
    };
    let Some(current) = current.as_object() else {
        return Vec::new();
    };
    present
        .iter()
        .filter(|(key, _)| current.contains_key(key.as_str()))
        .filter_map(|(key, sent)| incoming.get(key).map(|value| (key.as_str(), value, sent)))
        .collect()
}

fn entry<'a>(current: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    current.as_object_mut().and_then(|map| map.get_mut(key))
}

fn merge_schema(current: &mut Value, incoming: &Value, present: &Value) -> usize {
    let mut changed = 0;
    for (key, value, sent) in shared_keys(current, incoming, present) {
        let Some(slot) = entry(current, key) else {
            continue;
        };
        changed += match key {
            "context_plugin" => merge_plugin(slot, value, sent),
            "check_plugins" => merge_list(slot, value, sent, merge_check),
            "resultor_plugins" => merge_list(slot, value, sent, merge_plugin),
            _ => merge_value(slot, value, sent),
        };
    }
    changed
}

fn merge_check(current: &mut Value, incoming: &Value, present: &Value) -> usize {
    let mut changed = 0;
    for (key, value, sent) in shared_keys(current, incoming, present) {
        let Some(slot) = entry(current, key) else {
            continue;
        };
        changed += match key {
            // Plugin bindings are fixed once the schema is built
            "name" => 0,
            "context_plugin" => merge_plugin(slot, value, sent),
            "selector_plugins" | "resultor_plugins" => merge_list(slot, value, sent, merge_plugin),
            _ => merge_value(slot, value, sent),
        };
    }
    changed
}

fn merge_plugin(current: &mut Value, incoming: &Value, present: &Value) -> usize {
    let mut changed = 0;
    for (key, value, sent) in shared_keys(current, incoming, present) {
        if key == "name" {
            continue;
        }
        if let Some(slot) = entry(current, key) {
            changed += merge_value(slot, value, sent);
        }
    }
    changed
}

fn merge_list(
    current: &mut Value,
    incoming: &Value,
    present: &Value,
    merge_item: fn(&mut Value, &Value, &Value) -> usize,
) -> usize {
    let (Some(current), Some(incoming), Some(present)) =
        (current.as_array_mut(), incoming.as_array(), present.as_array())
    else {
        return 0;
    };
    current
        .iter_mut()
        .zip(incoming.iter().zip(present))
        .map(|(slot, (value, sent))| merge_item(slot, value, sent))
        .sum()
}

/// Generic merge: maps by existing key, lists positionally, scalars on change
pub(crate) fn merge_value(current: &mut Value, incoming: &Value, present: &Value) -> usize {
    match (current, incoming) {
        (Value::Object(current), Value::Object(incoming)) => {
            merge_map(current, incoming, present.as_object())
        }
        (Value::Array(current), Value::Array(incoming)) => {
            let present = present.as_array();
            current
                .iter_mut()
                .zip(incoming)
                .enumerate()
                .map(|(i, (slot, value))| {
                    let sent = present.and_then(|p| p.get(i)).unwrap_or(value);
                    merge_value(slot, value, sent)
                })
                .sum()
        }
        (current, incoming) => {
            if *current == *incoming {
                0
            } else {
                *current = incoming.clone();
                1
            }
        }
    }
}

fn merge_map(
    current: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    present: Option<&Map<String, Value>>,
) -> usize {
    let mut changed = 0;
    for (key, slot) in current.iter_mut() {
        let Some(value) = incoming.get(key) else {
            continue;
        };
        let sent = match present {
            Some(present) => match present.get(key) {
                Some(sent) => sent,
                None => continue,
            },
            None => value,
        };
        changed += merge_value(slot, value, sent);
    }
    changed
}
