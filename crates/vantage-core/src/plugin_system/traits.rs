use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::schema::SchemaDocument;

/// Per-descriptor plugin configuration (the `data` field of a document entry)
pub type PluginData = Value;

/// Values flowing between stages: context data, selector output, check data
pub type Payload = Value;

/// The `(success, message, payload)` triple every stage method reports
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T = ()> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> StageOutcome<T> {
    pub fn new(success: bool, message: impl Into<String>, data: T) -> Self {
        Self {
            success,
            message: message.into(),
            data,
        }
    }

    pub fn passed(message: impl Into<String>, data: T) -> Self {
        Self::new(true, message, data)
    }

    pub fn failed(message: impl Into<String>, data: T) -> Self {
        Self::new(false, message, data)
    }
}

/// A stage could not produce an outcome at all; always fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PluginCrash {
    pub message: String,
}

impl PluginCrash {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned by [`RunCallback::run`] when the nested work aborted the run.
///
/// The executor keeps the actual error and re-raises it once `setup`
/// returns, so a plugin only needs to stop and return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("nested validation aborted")]
pub struct RunAborted;

impl From<RunAborted> for PluginCrash {
    fn from(err: RunAborted) -> Self {
        PluginCrash::new(err.to_string())
    }
}

/// Result of a stage method; `Err` marks a crash
pub type PluginResult<T = ()> = Result<StageOutcome<T>, PluginCrash>;

/// Future returned by the nested-work callback
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RunAborted>> + Send + 'a>>;

/// The nested work handed to [`ContextPlugin::setup`].
///
/// The plugin decides whether and how often to invoke it; each invocation
/// runs everything nested under the context with the given context data.
pub struct RunCallback<'a> {
    callback: Box<dyn FnMut(Payload) -> RunFuture<'a> + Send + 'a>,
    invocations: usize,
}

impl<'a> RunCallback<'a> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(Payload) -> RunFuture<'a> + Send + 'a,
    {
        Self {
            callback: Box::new(callback),
            invocations: 0,
        }
    }

    /// Run the nested stages with `context` as their parent context
    pub async fn run(&mut self, context: Payload) -> Result<(), RunAborted> {
        self.invocations += 1;
        (self.callback)(context).await
    }

    /// Number of times the nested work was started
    pub fn invocations(&self) -> usize {
        self.invocations
    }
}

impl fmt::Debug for RunCallback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCallback")
            .field("invocations", &self.invocations)
            .finish_non_exhaustive()
    }
}

/// The four stage roles of a validation schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginKind {
    Context,
    Selector,
    Check,
    Resultor,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginKind::Context => "context",
            PluginKind::Selector => "selector",
            PluginKind::Check => "check",
            PluginKind::Resultor => "resultor",
        };
        f.write_str(name)
    }
}

/// Core trait that all stage plugins implement
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Registry key of the plugin
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Cleanup hook invoked when one of this plugin's methods crashed
    async fn on_crash(&self, _data: &PluginData, _context: Option<&Payload>) {}
}

/// Establishes and tears down an execution scope
#[async_trait]
pub trait ContextPlugin: Plugin {
    /// Verify the scope can be entered
    async fn check(&self, data: &PluginData, parent: Option<&Payload>) -> PluginResult;

    /// Enter the scope and run the nested work through `run_callback`.
    /// The returned payload is the context data that was handed to it.
    async fn setup(
        &self,
        data: &PluginData,
        run_callback: RunCallback<'_>,
        parent: Option<&Payload>,
    ) -> PluginResult<Payload>;

    /// Leave the scope
    async fn on_exit(&self, data: &PluginData, parent: Option<&Payload>) -> PluginResult;
}

/// Gathers or filters the data a check operates on
#[async_trait]
pub trait SelectorPlugin: Plugin {
    async fn select(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        previous: Option<&Payload>,
    ) -> PluginResult<Payload>;
}

/// Validates selected data and optionally repairs it
#[async_trait]
pub trait CheckPlugin: Plugin {
    async fn check(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload>;

    async fn fix(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload>;
}

/// Consumes the outcome of a run (report, export, notify)
#[async_trait]
pub trait ResultorPlugin: Plugin {
    async fn result(&self, data: &PluginData, schema: &SchemaDocument) -> PluginResult;
}

/// Ties each stage trait object to its [`PluginKind`]
pub trait StageRole {
    const KIND: PluginKind;
}

impl StageRole for dyn ContextPlugin {
    const KIND: PluginKind = PluginKind::Context;
}

impl StageRole for dyn SelectorPlugin {
    const KIND: PluginKind = PluginKind::Selector;
}

impl StageRole for dyn CheckPlugin {
    const KIND: PluginKind = PluginKind::Check;
}

impl StageRole for dyn ResultorPlugin {
    const KIND: PluginKind = PluginKind::Resultor;
}
