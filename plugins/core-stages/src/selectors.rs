use async_trait::async_trait;
use serde_json::Value;
use vantage_core::plugin_system::{Payload, PluginData};
use vantage_core::{Plugin, PluginResult, SelectorPlugin, StageOutcome};

use crate::{JSON_POINTER_KEY, data_str};

/// Selects the value at `data.pointer` (RFC 6901).
///
/// Reads the `document` of the context, or the previous selector's output
/// when `data.from_previous` is set.
#[derive(Debug, Default)]
pub struct JsonPointerSelector;

#[async_trait]
impl Plugin for JsonPointerSelector {
    fn name(&self) -> &str {
        JSON_POINTER_KEY
    }

    fn description(&self) -> &str {
        "Selects a value from the context document by JSON pointer"
    }
}

#[async_trait]
impl SelectorPlugin for JsonPointerSelector {
    async fn select(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        previous: Option<&Payload>,
    ) -> PluginResult<Payload> {
        let pointer = data_str(data, "pointer").unwrap_or("");
        let from_previous = data.get("from_previous").and_then(Value::as_bool) == Some(true);

        let source = if from_previous {
            previous
        } else {
            context.and_then(|context| context.get("document"))
        };
        let Some(source) = source else {
            return Ok(StageOutcome::failed("Nothing to select from", Value::Null));
        };

        match source.pointer(pointer) {
            Some(selected) => Ok(StageOutcome::passed(
                format!("Selected '{}'", pointer),
                selected.clone(),
            )),
            None => Ok(StageOutcome::failed(
                format!("Pointer '{}' matched nothing", pointer),
                Value::Null,
            )),
        }
    }
}
