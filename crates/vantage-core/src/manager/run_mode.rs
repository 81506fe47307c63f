use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::{InstanceId, StageNode, ValidationSchema};

/// Which stages of a schema one run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every stage enabled in the schema
    #[default]
    All,
    /// Only the check-groups containing a target, plus targeted top-level resultors
    OnlySelected,
    /// From the first targeted group or resultor through the end of the pipeline
    SelfToEnd,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunMode::All => "all",
            RunMode::OnlySelected => "only-selected",
            RunMode::SelfToEnd => "self-to-end",
        };
        f.write_str(name)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "all" => Ok(RunMode::All),
            "only-selected" => Ok(RunMode::OnlySelected),
            "self-to-end" => Ok(RunMode::SelfToEnd),
            other => Err(format!("Unknown run mode '{}'", other)),
        }
    }
}

/// Declared enabled flags of every descriptor, keyed by instance
#[derive(Debug, Clone, Default)]
pub(crate) struct EnabledSnapshot {
    flags: HashMap<InstanceId, bool>,
}

impl EnabledSnapshot {
    pub fn capture(schema: &ValidationSchema) -> Self {
        let mut flags = HashMap::new();
        schema.walk(&mut |_, node| {
            flags.insert(node.id(), node.is_enabled());
        });
        Self { flags }
    }

    fn enabled(&self, node: &dyn StageNode) -> bool {
        self.flags.get(&node.id()).copied().unwrap_or(false)
    }

    pub fn restore(&self, schema: &mut ValidationSchema) {
        schema.walk_mut(&mut |_, node| {
            let enabled = self.enabled(&*node);
            node.set_enabled(enabled);
        });
    }
}

/// A schema running under a mode's enabled flags.
///
/// Dropping it puts the declared flags back, so an abandoned run future
/// never leaves the schema narrowed.
pub(crate) struct ModeOverride<'a> {
    schema: &'a mut ValidationSchema,
    original: EnabledSnapshot,
}

impl<'a> ModeOverride<'a> {
    pub fn apply(
        schema: &'a mut ValidationSchema,
        mode: RunMode,
        targets: &HashSet<InstanceId>,
    ) -> Self {
        let original = EnabledSnapshot::capture(schema);
        apply(schema, mode, targets, &original);
        Self { schema, original }
    }

    pub fn schema(&mut self) -> &mut ValidationSchema {
        self.schema
    }
}

impl Drop for ModeOverride<'_> {
    fn drop(&mut self) {
        self.original.restore(self.schema);
    }
}

/// Recompute every enabled flag for `mode`, never enabling a stage the
/// snapshot has disabled
pub(crate) fn apply(
    schema: &mut ValidationSchema,
    mode: RunMode,
    targets: &HashSet<InstanceId>,
    original: &EnabledSnapshot,
) {
    original.restore(schema);
    if mode == RunMode::All {
        return;
    }

    let sticky_mode = mode == RunMode::SelfToEnd;
    let mut sticky = false;

    for group in schema.check_groups.iter_mut() {
        let hit = group.contains_any(targets);
        if sticky_mode && hit {
            sticky = true;
        }
        let selected = hit || sticky;
        group.check.enabled &= selected;
        group.context.enabled &= selected;
        for selector in group.selectors.iter_mut() {
            selector.enabled &= selected;
        }
        for resultor in group.resultors.iter_mut() {
            resultor.enabled &= selected;
        }
    }

    for resultor in schema.resultors.iter_mut() {
        let hit = targets.contains(&resultor.id());
        if sticky_mode && hit {
            sticky = true;
        }
        resultor.enabled &= hit || sticky;
    }

    log::debug!(
        "Applied run mode {} to schema '{}' with {} target(s)",
        mode,
        schema.name,
        targets.len()
    );
}
