use std::sync::Arc;

use crate::plugin_system::{CheckPlugin, ContextPlugin, PluginData, ResultorPlugin, SelectorPlugin};
use crate::schema::{PluginDescriptor, StageLocation, ValidationSchema};

/// One stage as a run sees it: fixed once the run mode is applied
pub(crate) struct StagePlan<P: ?Sized> {
    pub location: StageLocation,
    pub name: String,
    pub plugin: Arc<P>,
    pub data: PluginData,
    pub enabled: bool,
}

impl<P: ?Sized> StagePlan<P> {
    fn of(location: StageLocation, descriptor: &PluginDescriptor<P>) -> Self {
        Self {
            location,
            name: descriptor.name.clone(),
            plugin: Arc::clone(descriptor.instance()),
            data: descriptor.data.clone(),
            enabled: descriptor.enabled,
        }
    }
}

pub(crate) struct GroupPlan {
    pub check: StagePlan<dyn CheckPlugin>,
    pub stop_if_fix_failed: bool,
    pub pause_if_fix_failed: bool,
    pub context: StagePlan<dyn ContextPlugin>,
    pub selectors: Vec<StagePlan<dyn SelectorPlugin>>,
    pub resultors: Vec<StagePlan<dyn ResultorPlugin>>,
}

impl GroupPlan {
    pub fn is_enabled(&self) -> bool {
        self.check.enabled
    }

    pub fn has_resultors(&self) -> bool {
        self.resultors.iter().any(|r| r.enabled)
    }
}

pub(crate) struct RunPlan {
    pub context: StagePlan<dyn ContextPlugin>,
    pub groups: Vec<GroupPlan>,
    pub resultors: Vec<StagePlan<dyn ResultorPlugin>>,
}

impl RunPlan {
    pub fn of(schema: &ValidationSchema) -> Self {
        let groups = schema
            .check_groups
            .iter()
            .enumerate()
            .map(|(g, group)| GroupPlan {
                check: StagePlan::of(StageLocation::GroupCheck(g), &group.check),
                stop_if_fix_failed: group.stop_if_fix_failed,
                pause_if_fix_failed: group.pause_if_fix_failed,
                context: StagePlan::of(StageLocation::GroupContext(g), &group.context),
                selectors: group
                    .selectors
                    .iter()
                    .enumerate()
                    .map(|(s, d)| StagePlan::of(StageLocation::GroupSelector(g, s), d))
                    .collect(),
                resultors: group
                    .resultors
                    .iter()
                    .enumerate()
                    .map(|(r, d)| StagePlan::of(StageLocation::GroupResultor(g, r), d))
                    .collect(),
            })
            .collect();

        Self {
            context: StagePlan::of(StageLocation::Context, &schema.context),
            groups,
            resultors: schema
                .resultors
                .iter()
                .enumerate()
                .map(|(r, d)| StagePlan::of(StageLocation::Resultor(r), d))
                .collect(),
        }
    }

    pub fn has_resultors(&self) -> bool {
        self.resultors.iter().any(|r| r.enabled)
    }
}
