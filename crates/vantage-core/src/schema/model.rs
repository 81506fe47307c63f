use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::{EventBus, StageAction, ValidationEvent};
use crate::plugin_system::{
    CheckPlugin, ContextPlugin, PluginData, PluginKind, PluginRegistry, ResultorPlugin,
    SelectorPlugin, StageRole,
};
use crate::schema::document::{CheckDocument, PluginDocument, SchemaDocument};
use crate::schema::error::SchemaError;

/// Identity of one plugin instance inside a live schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a descriptor in the schema tree.
///
/// Renders as a path such as `check[1].selector[0]` and parses back from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageLocation {
    /// The top-level context
    Context,
    /// A check-group's check stage (the group itself)
    GroupCheck(usize),
    GroupContext(usize),
    GroupSelector(usize, usize),
    GroupResultor(usize, usize),
    /// A top-level resultor
    Resultor(usize),
}

impl StageLocation {
    /// Index of the owning check-group, if any
    pub fn group(&self) -> Option<usize> {
        match self {
            StageLocation::GroupCheck(g)
            | StageLocation::GroupContext(g)
            | StageLocation::GroupSelector(g, _)
            | StageLocation::GroupResultor(g, _) => Some(*g),
            StageLocation::Context | StageLocation::Resultor(_) => None,
        }
    }
}

impl fmt::Display for StageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageLocation::Context => write!(f, "context"),
            StageLocation::GroupCheck(g) => write!(f, "check[{}]", g),
            StageLocation::GroupContext(g) => write!(f, "check[{}].context", g),
            StageLocation::GroupSelector(g, s) => write!(f, "check[{}].selector[{}]", g, s),
            StageLocation::GroupResultor(g, r) => write!(f, "check[{}].resultor[{}]", g, r),
            StageLocation::Resultor(r) => write!(f, "resultor[{}]", r),
        }
    }
}

/// Split `name[3]` into `("name", Some(3))` and `name` into `("name", None)`
fn parse_segment(segment: &str) -> Option<(&str, Option<usize>)> {
    match segment.split_once('[') {
        None => Some((segment, None)),
        Some((name, rest)) => {
            let index = rest.strip_suffix(']')?.parse().ok()?;
            Some((name, Some(index)))
        }
    }
}

impl FromStr for StageLocation {
    type Err = SchemaError;

    fn from_str(path: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidStagePath {
            path: path.to_string(),
        };
        let segments: Vec<&str> = path.trim().split('.').collect();
        let parsed: Option<Vec<(&str, Option<usize>)>> =
            segments.iter().map(|s| parse_segment(s)).collect();
        let parsed = parsed.ok_or_else(invalid)?;

        match parsed.as_slice() {
            [("context", None)] => Ok(StageLocation::Context),
            [("resultor", Some(r))] => Ok(StageLocation::Resultor(*r)),
            [("check", Some(g))] => Ok(StageLocation::GroupCheck(*g)),
            [("check", Some(g)), ("context", None)] => Ok(StageLocation::GroupContext(*g)),
            [("check", Some(g)), ("selector", Some(s))] => Ok(StageLocation::GroupSelector(*g, *s)),
            [("check", Some(g)), ("resultor", Some(r))] => Ok(StageLocation::GroupResultor(*g, *r)),
            _ => Err(invalid()),
        }
    }
}

/// Outcome of the last invocation of a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub action: StageAction,
    pub success: bool,
    pub message: String,
}

/// One stage of the schema: configuration, run state and its plugin instance
pub struct PluginDescriptor<P: ?Sized> {
    id: InstanceId,
    pub name: String,
    pub enabled: bool,
    pub data: PluginData,
    /// Local progress of this stage (0 or 100)
    pub progress: f64,
    pub last_result: Option<StageRecord>,
    instance: Arc<P>,
}

impl<P: ?Sized> PluginDescriptor<P> {
    pub fn new(name: impl Into<String>, data: PluginData, instance: Arc<P>) -> Self {
        Self {
            id: InstanceId::next(),
            name: name.into(),
            enabled: true,
            data,
            progress: 0.0,
            last_result: None,
            instance,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn from_document(document: &PluginDocument, instance: Arc<P>) -> Self {
        Self {
            id: InstanceId::next(),
            name: document.name.clone(),
            enabled: document.enabled,
            data: document.data.clone(),
            progress: document.progress,
            last_result: document.last_result.clone(),
            instance,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn instance(&self) -> &Arc<P> {
        &self.instance
    }

    pub fn to_document(&self) -> PluginDocument {
        PluginDocument {
            name: self.name.clone(),
            enabled: self.enabled,
            data: self.data.clone(),
            progress: self.progress,
            last_result: self.last_result.clone(),
        }
    }
}

impl<P: ?Sized> Clone for PluginDescriptor<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            enabled: self.enabled,
            data: self.data.clone(),
            progress: self.progress,
            last_result: self.last_result.clone(),
            instance: Arc::clone(&self.instance),
        }
    }
}

impl<P: ?Sized> fmt::Debug for PluginDescriptor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

/// Uniform view over descriptors of every kind, used when walking the tree
pub trait StageNode {
    fn id(&self) -> InstanceId;
    fn name(&self) -> &str;
    fn kind(&self) -> PluginKind;
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn progress(&self) -> f64;
    fn set_progress(&mut self, progress: f64);
    fn last_result(&self) -> Option<&StageRecord>;
    fn set_last_result(&mut self, record: StageRecord);
}

impl<P: ?Sized + StageRole> StageNode for PluginDescriptor<P> {
    fn id(&self) -> InstanceId {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> PluginKind {
        P::KIND
    }
    fn is_enabled(&self) -> bool {
        self.enabled
    }
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
    fn progress(&self) -> f64 {
        self.progress
    }
    fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
    }
    fn last_result(&self) -> Option<&StageRecord> {
        self.last_result.as_ref()
    }
    fn set_last_result(&mut self, record: StageRecord) {
        self.last_result = Some(record);
    }
}

/// Nested context, selector chain, check and resultors: the unit of re-run
#[derive(Debug, Clone)]
pub struct CheckGroup {
    pub check: PluginDescriptor<dyn CheckPlugin>,
    /// Abort the whole run when the fix fails
    pub stop_if_fix_failed: bool,
    /// Pause the run and retry the check when the fix fails
    pub pause_if_fix_failed: bool,
    pub context: PluginDescriptor<dyn ContextPlugin>,
    pub selectors: Vec<PluginDescriptor<dyn SelectorPlugin>>,
    pub resultors: Vec<PluginDescriptor<dyn ResultorPlugin>>,
}

impl CheckGroup {
    pub fn new(
        check: PluginDescriptor<dyn CheckPlugin>,
        context: PluginDescriptor<dyn ContextPlugin>,
        selectors: Vec<PluginDescriptor<dyn SelectorPlugin>>,
    ) -> Self {
        Self {
            check,
            stop_if_fix_failed: false,
            pause_if_fix_failed: false,
            context,
            selectors,
            resultors: Vec::new(),
        }
    }

    pub fn with_resultors(mut self, resultors: Vec<PluginDescriptor<dyn ResultorPlugin>>) -> Self {
        self.resultors = resultors;
        self
    }

    pub fn stop_if_fix_failed(mut self, stop: bool) -> Self {
        self.stop_if_fix_failed = stop;
        self
    }

    pub fn pause_if_fix_failed(mut self, pause: bool) -> Self {
        self.pause_if_fix_failed = pause;
        self
    }

    /// The group is enabled when its check stage is
    pub fn is_enabled(&self) -> bool {
        self.check.enabled
    }

    pub fn id(&self) -> InstanceId {
        self.check.id()
    }

    pub fn has_enabled_resultors(&self) -> bool {
        self.resultors.iter().any(|r| r.enabled)
    }

    /// Whether any member of the group is one of `targets`
    pub fn contains_any(&self, targets: &std::collections::HashSet<InstanceId>) -> bool {
        targets.contains(&self.check.id())
            || targets.contains(&self.context.id())
            || self.selectors.iter().any(|s| targets.contains(&s.id()))
            || self.resultors.iter().any(|r| targets.contains(&r.id()))
    }

    fn from_document(document: &CheckDocument, registry: &PluginRegistry) -> Result<Self> {
        let check = PluginDescriptor::from_document(
            &document.plugin_document(),
            registry.create_check(&document.name)?,
        );
        let context = PluginDescriptor::from_document(
            &document.context_plugin,
            registry.create_context(&document.context_plugin.name)?,
        );
        let selectors = document
            .selector_plugins
            .iter()
            .map(|doc| Ok(PluginDescriptor::from_document(doc, registry.create_selector(&doc.name)?)))
            .collect::<Result<Vec<_>>>()?;
        let resultors = document
            .resultor_plugins
            .iter()
            .map(|doc| Ok(PluginDescriptor::from_document(doc, registry.create_resultor(&doc.name)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            check,
            stop_if_fix_failed: document.stop_if_fix_failed,
            pause_if_fix_failed: document.pause_if_fix_failed,
            context,
            selectors,
            resultors,
        })
    }

    fn to_document(&self) -> CheckDocument {
        let check = self.check.to_document();
        CheckDocument {
            name: check.name,
            enabled: check.enabled,
            data: check.data,
            progress: check.progress,
            last_result: check.last_result,
            stop_if_fix_failed: self.stop_if_fix_failed,
            pause_if_fix_failed: self.pause_if_fix_failed,
            context_plugin: self.context.to_document(),
            selector_plugins: self.selectors.iter().map(PluginDescriptor::to_document).collect(),
            resultor_plugins: self.resultors.iter().map(PluginDescriptor::to_document).collect(),
        }
    }
}

/// Live, mutable state of one validation schema.
///
/// `progress` and `finished` are derived fields: assigning them notifies the
/// schema's [`EventBus`].
pub struct ValidationSchema {
    pub name: String,
    pub uuid: Option<String>,
    pub context: PluginDescriptor<dyn ContextPlugin>,
    pub check_groups: Vec<CheckGroup>,
    pub resultors: Vec<PluginDescriptor<dyn ResultorPlugin>>,
    /// Push every progress/finish change to the attached progress sink
    pub send_request: bool,
    pub(crate) progress: f64,
    pub(crate) validation_passed: bool,
    pub(crate) finished: (bool, String),
    events: EventBus,
}

impl fmt::Debug for ValidationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSchema")
            .field("name", &self.name)
            .field("uuid", &self.uuid)
            .field("context", &self.context)
            .field("check_groups", &self.check_groups)
            .field("resultors", &self.resultors)
            .field("progress", &self.progress)
            .field("finished", &self.finished)
            .finish()
    }
}

impl ValidationSchema {
    /// Assemble a schema from descriptors; at least one check-group is required
    pub fn new(
        name: impl Into<String>,
        context: PluginDescriptor<dyn ContextPlugin>,
        check_groups: Vec<CheckGroup>,
        resultors: Vec<PluginDescriptor<dyn ResultorPlugin>>,
    ) -> std::result::Result<Self, SchemaError> {
        if check_groups.is_empty() {
            return Err(SchemaError::NoCheckPlugins);
        }
        Ok(Self {
            name: name.into(),
            uuid: None,
            context,
            check_groups,
            resultors,
            send_request: false,
            progress: 0.0,
            validation_passed: false,
            finished: (false, String::new()),
            events: EventBus::new(),
        })
    }

    /// Validate a document and instantiate one plugin per descriptor
    pub fn from_document(document: SchemaDocument, registry: &PluginRegistry) -> Result<Self> {
        document.validate()?;

        let context = PluginDescriptor::from_document(
            &document.context_plugin,
            registry.create_context(&document.context_plugin.name)?,
        );
        let check_groups = document
            .check_plugins
            .iter()
            .map(|doc| CheckGroup::from_document(doc, registry))
            .collect::<Result<Vec<_>>>()?;
        let resultors = document
            .resultor_plugins
            .iter()
            .map(|doc| Ok(PluginDescriptor::from_document(doc, registry.create_resultor(&doc.name)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut schema = Self::new(document.name, context, check_groups, resultors)?;
        schema.uuid = document.uuid;
        schema.send_request = document.send_request;
        schema.progress = document.progress;
        schema.validation_passed = document.validation_passed;
        schema.finished = document.finished;
        log::debug!(
            "Built schema '{}' with {} check group(s)",
            schema.name,
            schema.check_groups.len()
        );
        Ok(schema)
    }

    /// Serialisable snapshot of the live state
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            name: self.name.clone(),
            uuid: self.uuid.clone(),
            context_plugin: self.context.to_document(),
            check_plugins: self.check_groups.iter().map(CheckGroup::to_document).collect(),
            resultor_plugins: self.resultors.iter().map(PluginDescriptor::to_document).collect(),
            progress: self.progress,
            validation_passed: self.validation_passed,
            finished: self.finished.clone(),
            send_request: self.send_request,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Assign aggregate progress; returns whether the value changed.
    /// Observers are notified only on change.
    pub fn set_progress(&mut self, progress: f64) -> bool {
        if self.progress == progress {
            return false;
        }
        self.progress = progress;
        self.events.emit(&ValidationEvent::Progress(progress));
        true
    }

    /// Zero every stage's local progress and the aggregate, always notifying
    pub fn reset_progress(&mut self) {
        self.walk_mut(&mut |_, node| node.set_progress(0.0));
        self.progress = 0.0;
        self.events.emit(&ValidationEvent::Progress(0.0));
    }

    pub fn validation_passed(&self) -> bool {
        self.validation_passed
    }

    pub fn set_validation_passed(&mut self, passed: bool) {
        self.validation_passed = passed;
    }

    pub fn finished(&self) -> (bool, &str) {
        (self.finished.0, &self.finished.1)
    }

    /// Assign the terminal outcome and notify observers
    pub fn set_finished(&mut self, success: bool, message: impl Into<String>) {
        let message = message.into();
        let event_message = (!message.is_empty()).then(|| message.clone());
        self.finished = (success, message);
        self.events.emit(&ValidationEvent::RunFinished {
            success,
            message: event_message,
        });
    }

    /// Visit every descriptor in execution order
    pub fn walk(&self, visit: &mut dyn FnMut(StageLocation, &dyn StageNode)) {
        visit(StageLocation::Context, &self.context);
        for (g, group) in self.check_groups.iter().enumerate() {
            visit(StageLocation::GroupCheck(g), &group.check);
            visit(StageLocation::GroupContext(g), &group.context);
            for (s, selector) in group.selectors.iter().enumerate() {
                visit(StageLocation::GroupSelector(g, s), selector);
            }
            for (r, resultor) in group.resultors.iter().enumerate() {
                visit(StageLocation::GroupResultor(g, r), resultor);
            }
        }
        for (r, resultor) in self.resultors.iter().enumerate() {
            visit(StageLocation::Resultor(r), resultor);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(StageLocation, &mut dyn StageNode)) {
        visit(StageLocation::Context, &mut self.context);
        for (g, group) in self.check_groups.iter_mut().enumerate() {
            visit(StageLocation::GroupCheck(g), &mut group.check);
            visit(StageLocation::GroupContext(g), &mut group.context);
            for (s, selector) in group.selectors.iter_mut().enumerate() {
                visit(StageLocation::GroupSelector(g, s), selector);
            }
            for (r, resultor) in group.resultors.iter_mut().enumerate() {
                visit(StageLocation::GroupResultor(g, r), resultor);
            }
        }
        for (r, resultor) in self.resultors.iter_mut().enumerate() {
            visit(StageLocation::Resultor(r), resultor);
        }
    }

    /// Location of the descriptor holding `id`
    pub fn locate(&self, id: InstanceId) -> Option<StageLocation> {
        let mut found = None;
        self.walk(&mut |location, node| {
            if found.is_none() && node.id() == id {
                found = Some(location);
            }
        });
        found
    }

    /// Instance at `location`, if the schema has one there
    pub fn instance_at(&self, location: StageLocation) -> Option<InstanceId> {
        let mut found = None;
        self.walk(&mut |at, node| {
            if at == location {
                found = Some(node.id());
            }
        });
        found
    }

    /// Resolve a stage path such as `check[0].selector[1]`
    pub fn resolve(&self, path: &str) -> std::result::Result<InstanceId, SchemaError> {
        let location: StageLocation = path.parse()?;
        self.instance_at(location)
            .ok_or_else(|| SchemaError::UnknownStage {
                path: path.to_string(),
            })
    }

    /// Record the outcome of a stage invocation on its descriptor
    pub(crate) fn record(&mut self, location: StageLocation, record: StageRecord) {
        let mut record = Some(record);
        self.walk_mut(&mut |at, node| {
            if at == location {
                if let Some(record) = record.take() {
                    if record.success {
                        node.set_progress(100.0);
                    }
                    node.set_last_result(record);
                }
            }
        });
    }

    /// Release every subscription held on this schema's bus
    pub fn destroy(&mut self) {
        log::debug!("Destroying schema '{}'", self.name);
        self.events.clear();
    }
}
