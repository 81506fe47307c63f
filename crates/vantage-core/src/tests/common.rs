#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::manager::ManagerCore;
use crate::plugin_system::{
    CheckPlugin, ContextPlugin, Payload, Plugin, PluginCrash, PluginData, PluginRegistry,
    PluginResult, ResultorPlugin, RunCallback, SelectorPlugin, StageOutcome,
};
use crate::schema::SchemaDocument;

// ===== SCRIPTED OUTCOMES =====

/// Outcome a mock stage produces for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pass,
    Fail,
    Crash,
}

impl Step {
    fn parse(value: &Value) -> Step {
        match value.as_str() {
            Some("fail") => Step::Fail,
            Some("crash") => Step::Crash,
            _ => Step::Pass,
        }
    }

    fn outcome<T>(self, label: &str, data: T) -> PluginResult<T> {
        match self {
            Step::Pass => Ok(StageOutcome::passed(format!("{} passed", label), data)),
            Step::Fail => Ok(StageOutcome::failed(format!("{} failed", label), data)),
            Step::Crash => Err(PluginCrash::new(format!("{} crashed", label))),
        }
    }
}

/// Shared record of stage calls, labelled `<id>.<action>`
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    calls: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Tracker {
    pub fn record(&self, label: String) {
        self.calls.lock().unwrap().push(label);
    }

    pub fn record_payload(&self, label: String, payload: Value) {
        self.payloads.lock().unwrap().push((label, payload));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == label).count()
    }

    /// Payloads recorded under `label`, oldest first
    pub fn payloads(&self, label: &str) -> Vec<Value> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
        self.payloads.lock().unwrap().clear();
    }
}

/// Lets a test hold a stage mid-call: stages with `"wait": true` signal
/// `entered` and block until `release` is notified
#[derive(Debug, Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

// ===== MOCK PLUGIN =====

/// Data-driven stage usable in every role.
///
/// `data.id` labels the calls; `data.<action>` is `"pass"`, `"fail"`,
/// `"crash"` or a list of those consumed call by call (the last repeats).
pub struct MockPlugin {
    key: &'static str,
    tracker: Tracker,
    gate: Gate,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockPlugin {
    pub fn new(key: &'static str, tracker: Tracker, gate: Gate) -> Self {
        Self {
            key,
            tracker,
            gate,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn label(&self, data: &PluginData, action: &str) -> String {
        let id = data.get("id").and_then(Value::as_str).unwrap_or(self.key);
        format!("{}.{}", id, action)
    }

    /// Record the call and pick its scripted outcome
    async fn enter(&self, data: &PluginData, action: &str) -> (String, Step) {
        let label = self.label(data, action);
        self.tracker.record(label.clone());

        let nth = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(action.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        let step = match data.get(action) {
            Some(Value::Array(steps)) => steps
                .get(nth)
                .or_else(|| steps.last())
                .map(Step::parse)
                .unwrap_or(Step::Pass),
            Some(value) => Step::parse(value),
            None => Step::Pass,
        };

        if data.get("wait").and_then(Value::as_bool) == Some(true) && action != "on_exit" {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
        (label, step)
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        self.key
    }

    async fn on_crash(&self, data: &PluginData, _context: Option<&Payload>) {
        self.tracker.record(self.label(data, "on_crash"));
    }
}

#[async_trait]
impl ContextPlugin for MockPlugin {
    async fn check(&self, data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        let (label, step) = self.enter(data, "check").await;
        step.outcome(&label, ())
    }

    async fn setup(
        &self,
        data: &PluginData,
        mut run_callback: RunCallback<'_>,
        parent: Option<&Payload>,
    ) -> PluginResult<Payload> {
        let (label, step) = self.enter(data, "setup").await;
        if step == Step::Crash {
            return step.outcome(&label, Value::Null);
        }

        let context = json!({ "context": label, "parent": parent.cloned() });
        let invocations = data.get("invocations").and_then(Value::as_u64).unwrap_or(1);
        for _ in 0..invocations {
            if run_callback.run(context.clone()).await.is_err() {
                return Ok(StageOutcome::failed("nested run aborted", context));
            }
        }
        step.outcome(&label, context)
    }

    async fn on_exit(&self, data: &PluginData, _parent: Option<&Payload>) -> PluginResult {
        let (label, step) = self.enter(data, "on_exit").await;
        step.outcome(&label, ())
    }
}

#[async_trait]
impl SelectorPlugin for MockPlugin {
    async fn select(
        &self,
        data: &PluginData,
        context: Option<&Payload>,
        previous: Option<&Payload>,
    ) -> PluginResult<Payload> {
        let (label, step) = self.enter(data, "select").await;
        let selected = json!({
            "selector": label,
            "context": context.cloned(),
            "previous": previous.cloned(),
        });
        step.outcome(&label, selected)
    }
}

#[async_trait]
impl CheckPlugin for MockPlugin {
    async fn check(
        &self,
        data: &PluginData,
        _context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        let (label, step) = self.enter(data, "check").await;
        self.tracker.record_payload(label.clone(), selected.clone());
        step.outcome(&label, selected.clone())
    }

    async fn fix(
        &self,
        data: &PluginData,
        _context: Option<&Payload>,
        selected: &Payload,
    ) -> PluginResult<Payload> {
        let (label, step) = self.enter(data, "fix").await;
        step.outcome(&label, selected.clone())
    }
}

#[async_trait]
impl ResultorPlugin for MockPlugin {
    async fn result(&self, data: &PluginData, schema: &SchemaDocument) -> PluginResult {
        let (label, step) = self.enter(data, "result").await;
        self.tracker
            .record_payload(label.clone(), json!({ "progress": schema.progress }));
        step.outcome(&label, ())
    }
}

// ===== FIXTURE =====

/// Registry with the mock registered under `mock_context`, `mock_selector`,
/// `mock_check` and `mock_resultor`, all sharing one tracker and gate
pub struct Fixture {
    pub registry: PluginRegistry,
    pub tracker: Tracker,
    pub gate: Gate,
}

impl Fixture {
    pub fn new() -> Self {
        let tracker = Tracker::default();
        let gate = Gate::default();
        let mut registry = PluginRegistry::new();

        let (t, g) = (tracker.clone(), gate.clone());
        registry
            .register_context("mock_context", move || MockPlugin::new("mock_context", t.clone(), g.clone()))
            .unwrap();
        let (t, g) = (tracker.clone(), gate.clone());
        registry
            .register_selector("mock_selector", move || MockPlugin::new("mock_selector", t.clone(), g.clone()))
            .unwrap();
        let (t, g) = (tracker.clone(), gate.clone());
        registry
            .register_check("mock_check", move || MockPlugin::new("mock_check", t.clone(), g.clone()))
            .unwrap();
        let (t, g) = (tracker.clone(), gate.clone());
        registry
            .register_resultor("mock_resultor", move || MockPlugin::new("mock_resultor", t.clone(), g.clone()))
            .unwrap();

        Self {
            registry,
            tracker,
            gate,
        }
    }

    pub fn document(&self, document: Value) -> SchemaDocument {
        SchemaDocument::from_value(document).unwrap()
    }

    pub fn manager(&self, document: Value) -> ManagerCore {
        ManagerCore::from_document(self.document(document), &self.registry).unwrap()
    }
}

// ===== DOCUMENT BUILDERS =====

pub fn entry(name: &str, id: &str) -> Value {
    json!({ "name": name, "data": { "id": id } })
}

/// Check-group `id` with one nested context, one selector and `resultors` resultors.
///
/// Labels: `<id>` for the check, `<id>_ctx`, `<id>_sel`, `<id>_res<N>`.
pub fn group(id: &str, resultors: usize) -> Value {
    let resultors: Vec<Value> = (0..resultors)
        .map(|r| entry("mock_resultor", &format!("{}_res{}", id, r)))
        .collect();
    json!({
        "name": "mock_check",
        "data": { "id": id },
        "context_plugin": entry("mock_context", &format!("{}_ctx", id)),
        "selector_plugins": [entry("mock_selector", &format!("{}_sel", id))],
        "resultor_plugins": resultors,
    })
}

/// Schema with a top context `top` and `resultors` top-level resultors `top_res<N>`
pub fn schema(groups: Vec<Value>, resultors: usize) -> Value {
    let resultors: Vec<Value> = (0..resultors)
        .map(|r| entry("mock_resultor", &format!("top_res{}", r)))
        .collect();
    json!({
        "name": "fixture",
        "context_plugin": entry("mock_context", "top"),
        "check_plugins": groups,
        "resultor_plugins": resultors,
    })
}

/// Set `value` at `path`, creating objects on the way
pub fn set(mut document: Value, path: &[&str], value: Value) -> Value {
    let mut cursor = &mut document;
    for (i, key) in path.iter().enumerate() {
        let slot = match key.parse::<usize>() {
            Ok(index) if cursor.is_array() => &mut cursor[index],
            _ => &mut cursor[*key],
        };
        if i + 1 == path.len() {
            *slot = value;
            return document;
        }
        cursor = slot;
    }
    document
}

/// The golden progress fixture: G1 without resultors, G2 disabled,
/// G3 with two resultors, two top-level resultors
pub fn golden_schema() -> Value {
    schema(
        vec![
            group("g1", 0),
            set(group("g2", 0), &["enabled"], json!(false)),
            group("g3", 2),
        ],
        2,
    )
}
