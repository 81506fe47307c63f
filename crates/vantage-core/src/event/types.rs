use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{InstanceId, StageLocation};

/// The stage method an invocation went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// `check` on a Context or Check stage
    Check,
    /// `setup` on a Context stage
    Setup,
    /// `on_exit` on a Context stage
    #[serde(rename = "on_exit")]
    Exit,
    /// `select` on a Selector stage
    Select,
    /// `fix` on a Check stage
    Fix,
    /// `result` on a Resultor stage
    Result,
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageAction::Check => "check",
            StageAction::Setup => "setup",
            StageAction::Exit => "on_exit",
            StageAction::Select => "select",
            StageAction::Fix => "fix",
            StageAction::Result => "result",
        };
        f.write_str(name)
    }
}

/// Outcome of a single stage invocation
#[derive(Debug, Clone, PartialEq)]
pub struct StageEvent {
    pub instance: InstanceId,
    pub location: StageLocation,
    pub plugin: String,
    pub action: StageAction,
    pub success: bool,
    pub message: String,
}

/// Notifications fired while a schema is validated
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationEvent {
    /// A run has started
    RunStarted,
    /// A run has finished, successfully or not
    RunFinished { success: bool, message: Option<String> },
    /// The run was paused (`true`) or resumed (`false`)
    RunPaused(bool),
    /// The run observed a stop request and unwound
    RunStopped,
    /// Aggregate progress changed (0-100)
    Progress(f64),
    /// A stage method returned
    Stage(StageEvent),
}

/// Discriminant of [`ValidationEvent`], used to filter subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStarted,
    RunFinished,
    RunPaused,
    RunStopped,
    Progress,
    Stage,
}

impl ValidationEvent {
    /// Get the name of this event
    pub fn name(&self) -> &'static str {
        match self {
            ValidationEvent::RunStarted => "run.started",
            ValidationEvent::RunFinished { .. } => "run.finished",
            ValidationEvent::RunPaused(_) => "run.paused",
            ValidationEvent::RunStopped => "run.stopped",
            ValidationEvent::Progress(_) => "run.progress",
            ValidationEvent::Stage(_) => "stage.completed",
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ValidationEvent::RunStarted => EventKind::RunStarted,
            ValidationEvent::RunFinished { .. } => EventKind::RunFinished,
            ValidationEvent::RunPaused(_) => EventKind::RunPaused,
            ValidationEvent::RunStopped => EventKind::RunStopped,
            ValidationEvent::Progress(_) => EventKind::Progress,
            ValidationEvent::Stage(_) => EventKind::Stage,
        }
    }
}
