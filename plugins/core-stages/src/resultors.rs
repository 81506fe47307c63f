use std::path::Path;

use async_trait::async_trait;
use vantage_core::plugin_system::PluginData;
use vantage_core::{Plugin, PluginResult, ResultorPlugin, SchemaDocument, StageOutcome};

use crate::{JSON_REPORT_KEY, LOG_REPORT_KEY, data_str};

/// Logs the last outcome of every check-group
#[derive(Debug, Default)]
pub struct LogReportResultor;

#[async_trait]
impl Plugin for LogReportResultor {
    fn name(&self) -> &str {
        LOG_REPORT_KEY
    }

    fn description(&self) -> &str {
        "Logs each check group's last outcome"
    }
}

#[async_trait]
impl ResultorPlugin for LogReportResultor {
    async fn result(&self, _data: &PluginData, schema: &SchemaDocument) -> PluginResult {
        log::info!("Report for schema '{}' ({:.1}%)", schema.name, schema.progress);
        let mut reported = 0;
        for (index, check) in schema.check_plugins.iter().enumerate() {
            if !check.enabled {
                log::info!("  check[{}] {}: skipped", index, check.name);
                continue;
            }
            match &check.last_result {
                Some(record) if record.success => {
                    log::info!("  check[{}] {}: passed ({})", index, check.name, record.message)
                }
                Some(record) => log::warn!(
                    "  check[{}] {}: failed during {} ({})",
                    index,
                    check.name,
                    record.action,
                    record.message
                ),
                None => log::info!("  check[{}] {}: not run", index, check.name),
            }
            reported += 1;
        }
        Ok(StageOutcome::passed(format!("Reported {} check group(s)", reported), ()))
    }
}

/// Writes the schema document to `data.path`; the format follows the extension
#[derive(Debug, Default)]
pub struct JsonReportResultor;

#[async_trait]
impl Plugin for JsonReportResultor {
    fn name(&self) -> &str {
        JSON_REPORT_KEY
    }

    fn description(&self) -> &str {
        "Writes the schema document to data.path"
    }
}

#[async_trait]
impl ResultorPlugin for JsonReportResultor {
    async fn result(&self, data: &PluginData, schema: &SchemaDocument) -> PluginResult {
        let Some(path) = data_str(data, "path") else {
            return Ok(StageOutcome::failed("json_report requires data.path", ()));
        };
        match schema.save(Path::new(path)) {
            Ok(()) => Ok(StageOutcome::passed(format!("Wrote report to '{}'", path), ())),
            Err(e) => {
                log::error!("Failed to write report to '{}': {}", path, e);
                Ok(StageOutcome::failed(e.to_string(), ()))
            }
        }
    }
}
