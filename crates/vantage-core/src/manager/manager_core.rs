use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::event::{EventBus, ValidationEvent};
use crate::manager::control::RunControl;
use crate::manager::error::ValidationError;
use crate::manager::executor::Executor;
use crate::manager::run_mode::{ModeOverride, RunMode};
use crate::manager::sink::ProgressSink;
use crate::plugin_system::PluginRegistry;
use crate::schema::{InstanceId, SchemaDocument, ValidationSchema};

/// Owns a live schema and runs it.
///
/// Runs borrow the manager mutably, so a schema never has two runs touching
/// it at once. Use [`ManagerCore::control`] to pause, resume or stop a run
/// from another task.
pub struct ManagerCore {
    schema: ValidationSchema,
    control: RunControl,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for ManagerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerCore")
            .field("schema", &self.schema.name)
            .field("running", &self.control.is_running())
            .field("paused", &self.control.is_paused())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl ManagerCore {
    pub fn new(schema: ValidationSchema) -> Self {
        let control = RunControl::new(schema.events().clone());
        Self {
            schema,
            control,
            sink: None,
        }
    }

    /// Build the schema from a document, instantiating plugins from `registry`
    pub fn from_document(document: SchemaDocument, registry: &PluginRegistry) -> Result<Self> {
        let schema = ValidationSchema::from_document(document, registry)?;
        Ok(Self::new(schema))
    }

    /// Attach a sink receiving the schema on every progress change
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut ValidationSchema {
        &mut self.schema
    }

    pub fn events(&self) -> &EventBus {
        self.schema.events()
    }

    pub fn document(&self) -> SchemaDocument {
        self.schema.to_document()
    }

    /// Merge a partial document into the live schema; see [`ValidationSchema::update`]
    pub fn update(&mut self, partial: &Value) -> Result<usize> {
        Ok(self.schema.update(partial)?)
    }

    /// Handle for controlling runs from elsewhere
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Run every stage enabled in the schema
    pub async fn run_all(&mut self) -> Result<bool> {
        self.run(RunMode::All, &[]).await
    }

    /// Run the schema restricted by `mode` to `targets`.
    ///
    /// Returns whether every check passed. A run that aborts fires
    /// `RunFinished(false, ..)` and returns the error.
    pub async fn run(&mut self, mode: RunMode, targets: &[InstanceId]) -> Result<bool> {
        if self.control.is_running() {
            log::warn!(
                "A run of '{}' is still active, stopping it first",
                self.schema.name
            );
            self.control.stop();
            tokio::task::yield_now().await;
        }
        let generation = self.control.begin();

        log::info!("Starting validation of '{}' ({} mode)", self.schema.name, mode);
        self.schema.events().emit(&ValidationEvent::RunStarted);

        let targets: HashSet<InstanceId> = targets.iter().copied().collect();
        let outcome = {
            let mut mode_override = ModeOverride::apply(&mut self.schema, mode, &targets);
            let executor = Executor::new(
                mode_override.schema(),
                self.control.clone(),
                generation,
                self.sink.clone(),
            );
            executor.execute().await
        };

        self.control.finish(generation);
        self.conclude(outcome).await
    }

    async fn conclude(&mut self, outcome: std::result::Result<bool, ValidationError>) -> Result<bool> {
        match outcome {
            Ok(passed) => {
                let message = if passed {
                    log::info!("Validation of '{}' passed", self.schema.name);
                    String::new()
                } else {
                    log::warn!("Validation of '{}' failed", self.schema.name);
                    "At least one check failed".to_string()
                };
                self.schema.set_finished(passed, message);
                self.push().await?;
                Ok(passed)
            }
            Err(err) => {
                if matches!(err, ValidationError::Stopped) {
                    log::info!("Validation of '{}' stopped", self.schema.name);
                    self.schema.events().emit(&ValidationEvent::RunStopped);
                } else {
                    log::error!("Validation of '{}' aborted: {}", self.schema.name, err);
                }
                self.schema.set_finished(false, err.to_string());
                if !matches!(err, ValidationError::ProgressSink(_)) {
                    if let Err(sink_err) = self.push().await {
                        log::warn!("Could not report aborted run: {}", sink_err);
                    }
                }
                Err(err.into())
            }
        }
    }

    async fn push(&self) -> std::result::Result<(), ValidationError> {
        match &self.sink {
            Some(sink) if self.schema.send_request => sink
                .send(&self.schema.to_document())
                .await
                .map_err(ValidationError::ProgressSink),
            _ => Ok(()),
        }
    }

    /// Stop any active run and drop every event subscription
    pub fn destroy(&mut self) {
        self.control.stop();
        self.schema.destroy();
    }
}
