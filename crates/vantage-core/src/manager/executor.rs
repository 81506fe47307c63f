use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::event::{StageAction, StageEvent, ValidationEvent};
use crate::manager::control::RunControl;
use crate::manager::error::ValidationError;
use crate::manager::plan::{GroupPlan, RunPlan, StagePlan};
use crate::manager::progress::ProgressWindow;
use crate::manager::sink::ProgressSink;
use crate::plugin_system::{
    ContextPlugin, Payload, Plugin, PluginResult, ResultorPlugin, RunAborted, RunCallback,
    RunFuture, StageOutcome,
};
use crate::schema::{StageRecord, ValidationSchema};

type NestedFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ValidationError>> + Send + 'a>>;

/// What a context's run callback executes
#[derive(Clone, Copy)]
enum NestedWork<'a> {
    /// Every enabled check-group, then the top-level resultors
    Groups(ProgressWindow),
    /// One group's selector chain and check
    CheckStep {
        group: &'a GroupPlan,
        window: ProgressWindow,
    },
}

fn stage_failed<P: ?Sized>(
    stage: &StagePlan<P>,
    action: StageAction,
    message: String,
) -> ValidationError {
    ValidationError::StageFailed {
        stage: stage.location.to_string(),
        plugin: stage.name.clone(),
        action,
        message,
    }
}

/// Drives a single run over a schema whose enabled flags are already set
pub(crate) struct Executor<'s> {
    schema: Mutex<&'s mut ValidationSchema>,
    plan: RunPlan,
    control: RunControl,
    generation: u64,
    sink: Option<Arc<dyn ProgressSink>>,
    check_failed: AtomicBool,
}

impl<'s> Executor<'s> {
    pub fn new(
        schema: &'s mut ValidationSchema,
        control: RunControl,
        generation: u64,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Self {
        let plan = RunPlan::of(schema);
        Self {
            schema: Mutex::new(schema),
            plan,
            control,
            generation,
            sink,
            check_failed: AtomicBool::new(false),
        }
    }

    /// Run the pipeline; `Ok(false)` when it completed with a failed check
    pub async fn execute(&self) -> Result<bool, ValidationError> {
        {
            let mut schema = self.schema.lock().await;
            schema.set_validation_passed(false);
            schema.reset_progress();
        }
        self.push().await?;

        let full = ProgressWindow::full();
        if self.plan.context.enabled {
            self.run_context(
                &self.plan.context,
                None,
                NestedWork::Groups(full.back_half()),
                Some(full.midpoint()),
            )
            .await?;
        } else {
            self.run_groups(full, None).await?;
        }

        Ok(!self.check_failed.load(Ordering::SeqCst))
    }

    fn ensure_running(&self) -> Result<(), ValidationError> {
        if self.control.should_stop(self.generation) {
            return Err(ValidationError::Stopped);
        }
        Ok(())
    }

    /// Push the serialised schema to the sink, if the schema asks for it
    async fn push(&self) -> Result<(), ValidationError> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        let document = {
            let schema = self.schema.lock().await;
            if !schema.send_request {
                return Ok(());
            }
            schema.to_document()
        };
        sink.send(&document).await.map_err(ValidationError::ProgressSink)
    }

    async fn advance(&self, progress: f64) -> Result<(), ValidationError> {
        let changed = self.schema.lock().await.set_progress(progress);
        if changed {
            self.push().await?;
        }
        Ok(())
    }

    /// Record a stage invocation and turn a crash into a run error
    async fn settle<P, T>(
        &self,
        stage: &StagePlan<P>,
        action: StageAction,
        context: Option<&Payload>,
        result: PluginResult<T>,
    ) -> Result<StageOutcome<T>, ValidationError>
    where
        P: Plugin + ?Sized,
        T: Send,
    {
        let (success, message) = match &result {
            Ok(outcome) => (outcome.success, outcome.message.clone()),
            Err(crash) => (false, crash.message.clone()),
        };
        log::debug!(
            "{} '{}' at {}: success={} {}",
            action,
            stage.name,
            stage.location,
            success,
            message
        );

        {
            let mut schema = self.schema.lock().await;
            if let Some(instance) = schema.instance_at(stage.location) {
                schema.record(
                    stage.location,
                    StageRecord {
                        action,
                        success,
                        message: message.clone(),
                    },
                );
                schema.events().emit(&ValidationEvent::Stage(StageEvent {
                    instance,
                    location: stage.location,
                    plugin: stage.name.clone(),
                    action,
                    success,
                    message,
                }));
            }
        }

        match result {
            Ok(outcome) => Ok(outcome),
            Err(crash) => {
                log::error!(
                    "Plugin '{}' at {} crashed during {}: {}",
                    stage.name,
                    stage.location,
                    action,
                    crash
                );
                stage.plugin.on_crash(&stage.data, context).await;
                Err(ValidationError::PluginCrashed {
                    stage: stage.location.to_string(),
                    plugin: stage.name.clone(),
                    action,
                    message: crash.message,
                })
            }
        }
    }

    /// Check, set up (running `nested` through the callback) and exit a context.
    ///
    /// `entered` is the progress reached once the context's check passes.
    async fn run_context(
        &self,
        stage: &StagePlan<dyn ContextPlugin>,
        parent: Option<&Payload>,
        nested: NestedWork<'_>,
        entered: Option<f64>,
    ) -> Result<(), ValidationError> {
        let plugin = &*stage.plugin;
        let data = &stage.data;

        let checked = plugin.check(data, parent).await;
        let outcome = self.settle(stage, StageAction::Check, parent, checked).await?;
        self.ensure_running()?;
        if !outcome.success {
            return Err(stage_failed(stage, StageAction::Check, outcome.message));
        }
        if let Some(progress) = entered {
            self.advance(progress).await?;
        }

        let aborted: Mutex<Option<ValidationError>> = Mutex::new(None);
        let setup = {
            let slot = &aborted;
            let this = self;
            let callback = RunCallback::new(move |context: Payload| {
                let future: RunFuture<'_> = Box::pin(async move {
                    if slot.lock().await.is_some() {
                        return Err(RunAborted);
                    }
                    match this.run_nested(nested, context).await {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            *slot.lock().await = Some(err);
                            Err(RunAborted)
                        }
                    }
                });
                future
            });
            plugin.setup(data, callback, parent).await
        };
        if let Some(err) = aborted.into_inner() {
            return Err(err);
        }

        let outcome = self.settle(stage, StageAction::Setup, parent, setup).await?;
        self.ensure_running()?;
        if !outcome.success {
            return Err(stage_failed(stage, StageAction::Setup, outcome.message));
        }

        let exited = plugin.on_exit(data, parent).await;
        let outcome = self.settle(stage, StageAction::Exit, parent, exited).await?;
        self.ensure_running()?;
        if !outcome.success {
            return Err(stage_failed(stage, StageAction::Exit, outcome.message));
        }
        Ok(())
    }

    fn run_nested<'a>(&'a self, nested: NestedWork<'a>, context: Payload) -> NestedFuture<'a> {
        Box::pin(async move {
            match nested {
                NestedWork::Groups(window) => self.run_groups(window, Some(&context)).await,
                NestedWork::CheckStep { group, window } => {
                    self.run_check_step(group, window, Some(&context)).await
                }
            }
        })
    }

    async fn run_groups(
        &self,
        window: ProgressWindow,
        parent: Option<&Payload>,
    ) -> Result<(), ValidationError> {
        let groups: Vec<&GroupPlan> = self.plan.groups.iter().filter(|g| g.is_enabled()).collect();
        if groups.is_empty() {
            return Err(ValidationError::NoCheckGroupEnabled);
        }

        let top_resultors = self.plan.has_resultors();
        let units = groups
            .iter()
            .map(|g| 1 + usize::from(g.has_resultors()))
            .sum::<usize>()
            + usize::from(top_resultors);
        let unit = window.unit(units);

        let mut cursor = window.start;
        for group in groups {
            let weight = 1 + usize::from(group.has_resultors());
            let group_window = ProgressWindow {
                start: cursor,
                end: cursor + unit * weight as f64,
            };
            self.run_group(group, group_window, parent).await?;
            cursor = group_window.end;
        }

        self.schema.lock().await.set_validation_passed(true);

        if top_resultors {
            let window = ProgressWindow {
                start: cursor,
                end: window.end,
            };
            self.run_resultors(&self.plan.resultors, window).await?;
        }
        Ok(())
    }

    async fn run_group(
        &self,
        group: &GroupPlan,
        window: ProgressWindow,
        parent: Option<&Payload>,
    ) -> Result<(), ValidationError> {
        log::debug!("Running check group '{}' at {}", group.check.name, group.check.location);
        let step = if group.has_resultors() {
            window.front_half()
        } else {
            window
        };

        if group.context.enabled {
            let nested = NestedWork::CheckStep {
                group,
                window: step,
            };
            self.run_context(&group.context, parent, nested, None).await?;
        } else {
            self.run_check_step(group, step, parent).await?;
        }

        if group.has_resultors() {
            self.run_resultors(&group.resultors, window.back_half()).await?;
        }
        Ok(())
    }

    /// Selector chain then check, fixing on failure.
    ///
    /// A failed fix on a group that pauses waits for resume and starts over.
    async fn run_check_step(
        &self,
        group: &GroupPlan,
        window: ProgressWindow,
        context: Option<&Payload>,
    ) -> Result<(), ValidationError> {
        let check = &group.check;
        let plugin = &*check.plugin;

        loop {
            let selected = self.run_selectors(group, context).await?;
            let checked = plugin.check(&check.data, context, &selected).await;
            let outcome = self.settle(check, StageAction::Check, context, checked).await?;
            self.ensure_running()?;
            if outcome.success {
                break;
            }
            log::warn!(
                "Check '{}' at {} failed: {}",
                check.name,
                check.location,
                outcome.message
            );

            // Selectors may not be idempotent; fix works on fresh data
            let selected = self.run_selectors(group, context).await?;
            let fixed = plugin.fix(&check.data, context, &selected).await;
            let fixed = self.settle(check, StageAction::Fix, context, fixed).await?;
            self.ensure_running()?;
            if fixed.success {
                break;
            }

            if group.stop_if_fix_failed {
                plugin.on_crash(&check.data, context).await;
                return Err(ValidationError::FixFailed {
                    stage: check.location.to_string(),
                    plugin: check.name.clone(),
                    message: fixed.message,
                });
            }
            if group.pause_if_fix_failed {
                log::warn!("Fix of '{}' failed, pausing before retry", check.name);
                self.control.pause();
                self.control.wait_while_paused().await;
                self.ensure_running()?;
                continue;
            }

            log::warn!("Fix of '{}' failed: {}", check.name, fixed.message);
            self.check_failed.store(true, Ordering::SeqCst);
            break;
        }

        self.advance(window.end).await
    }

    async fn run_selectors(
        &self,
        group: &GroupPlan,
        context: Option<&Payload>,
    ) -> Result<Payload, ValidationError> {
        let mut previous: Option<Payload> = None;
        for selector in group.selectors.iter().filter(|s| s.enabled) {
            let selected = selector
                .plugin
                .select(&selector.data, context, previous.as_ref())
                .await;
            let outcome = self.settle(selector, StageAction::Select, context, selected).await?;
            self.ensure_running()?;
            if !outcome.success {
                return Err(stage_failed(selector, StageAction::Select, outcome.message));
            }
            previous = Some(outcome.data);
        }
        previous.ok_or_else(|| ValidationError::NoSelectorEnabled {
            stage: group.check.location.to_string(),
        })
    }

    /// Resultors share the back half of `window`; progress ends at its end
    async fn run_resultors(
        &self,
        resultors: &[StagePlan<dyn ResultorPlugin>],
        window: ProgressWindow,
    ) -> Result<(), ValidationError> {
        let enabled: Vec<&StagePlan<dyn ResultorPlugin>> =
            resultors.iter().filter(|r| r.enabled).collect();
        let count = enabled.len();

        for (done, resultor) in enabled.into_iter().enumerate() {
            let document = self.schema.lock().await.to_document();
            let reported = resultor.plugin.result(&resultor.data, &document).await;
            let outcome = self.settle(resultor, StageAction::Result, None, reported).await?;
            self.ensure_running()?;
            if !outcome.success {
                return Err(stage_failed(resultor, StageAction::Result, outcome.message));
            }
            self.advance(window.resultor_step(done + 1, count)).await?;
        }
        self.advance(window.end).await
    }
}
