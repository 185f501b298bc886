// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::plan::ExecutionPlan;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{SkipReason, TaskInfo, TaskStatus};
use crate::engine::TaskOutcome;
use crate::errors::ConfigResult;
use crate::registry::TaskGraph;
use crate::summary::{BuildSummary, TaskSummary};
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Worker-pool size: at most this many tasks are `Running` at once.
    pub max_parallel: usize,
    /// Disable the downstream-skip cascade.
    pub continue_on_failure: bool,
    /// Deadline for tasks without their own `timeout`.
    pub default_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_parallel: default_workers(),
            continue_on_failure: false,
            default_timeout: None,
        }
    }
}

/// Number of CPUs, or 1 if that cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Scheduler holds the linked task graph plus the status table of one build.
///
/// It is responsible for:
/// - deciding which planned tasks are eligible and dispatching them in rank
///   order without exceeding the worker bound
/// - skipping the dependents of failed tasks
/// - appending finalizers once their trigger succeeded
/// - cancelling pending work on abort
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    options: SchedulerOptions,
    /// Status table in rank order.
    tasks: Vec<TaskInfo>,
    index: HashMap<TaskId, usize>,
    aborted: bool,
}

impl Scheduler {
    /// Construct a scheduler for an already-built plan.
    pub fn new(graph: Arc<TaskGraph>, plan: &ExecutionPlan, mut options: SchedulerOptions) -> Self {
        options.max_parallel = options.max_parallel.max(1);

        let mut tasks = Vec::with_capacity(plan.len());
        let mut index = HashMap::with_capacity(plan.len());

        for (rank, planned) in plan.tasks().iter().enumerate() {
            let Some(linked) = graph.task(&planned.id) else {
                warn!(task = %planned.id, "planned task missing from task graph; ignoring");
                continue;
            };
            let mut info = TaskInfo::from_linked(linked, rank, options.default_timeout);
            info.hard_deps = planned.hard_deps.clone();
            info.soft_deps = planned.soft_deps.clone();
            info.triggers = planned.triggers.clone();
            info.named = planned.named;
            index.insert(info.id.clone(), tasks.len());
            tasks.push(info);
        }

        Self {
            graph,
            options,
            tasks,
            index,
            aborted: false,
        }
    }

    /// Plan `targets` and construct a scheduler for them.
    pub fn for_targets(
        graph: Arc<TaskGraph>,
        targets: &[TaskId],
        options: SchedulerOptions,
    ) -> ConfigResult<Self> {
        let plan = ExecutionPlan::build(&graph, targets)?;
        Ok(Self::new(graph, &plan, options))
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn status_of(&self, id: &TaskId) -> Option<&TaskStatus> {
        self.index.get(id).map(|&i| &self.tasks[i].status)
    }

    /// Every task in the build, in rank order.
    pub fn tasks(&self) -> &[TaskInfo] {
        &self.tasks
    }

    /// Snapshot of `(task, status)` in rank order.
    pub fn statuses(&self) -> Vec<(TaskId, TaskStatus)> {
        self.tasks
            .iter()
            .map(|t| (t.id.clone(), t.status.clone()))
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.read_only().running_count()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether nothing is `Pending` or `Running`.
    pub fn is_finished(&self) -> bool {
        self.read_only().all_tasks_terminal()
    }

    /// Whether `id` may start now (`None` for unknown tasks).
    pub fn deps_satisfied(&self, id: &TaskId) -> Option<bool> {
        let &i = self.index.get(id)?;
        Some(self.read_only().deps_satisfied(&self.tasks[i]))
    }

    pub fn summary(&self) -> BuildSummary {
        BuildSummary::new(
            self.tasks
                .iter()
                .map(|t| TaskSummary {
                    id: t.id.clone(),
                    status: t.status.clone(),
                    finalizer: t.dynamic,
                })
                .collect(),
        )
    }

    /// Dispatch the initially eligible tasks.
    pub fn start(&mut self) -> SchedulerStep {
        info!(
            tasks = self.tasks.len(),
            workers = self.options.max_parallel,
            "starting build"
        );
        let mut step = SchedulerStep::default();
        self.dispatch(&mut step);
        step.build_finished = self.is_finished();
        step
    }

    /// Record the outcome of a running task and dispatch whatever it unblocked.
    pub fn step_completion(&mut self, id: &TaskId, outcome: TaskOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(&i) = self.index.get(id) else {
            warn!(task = %id, "completion for unknown task; ignoring");
            step.build_finished = self.is_finished();
            return step;
        };
        if self.tasks[i].status != TaskStatus::Running {
            warn!(
                task = %id,
                status = %self.tasks[i].status,
                "completion for task that is not running; ignoring"
            );
            step.build_finished = self.is_finished();
            return step;
        }

        match outcome {
            TaskOutcome::Success => {
                self.tasks[i].status = TaskStatus::Succeeded;
                debug!(task = %id, "task completed successfully");

                if self.aborted {
                    debug!(task = %id, "build aborted; not adding finalizers");
                } else {
                    let finalizers = self.tasks[i].finalized_by.clone();
                    for finalizer in &finalizers {
                        self.add_finalizer(finalizer, id, &mut step);
                    }
                }
            }
            TaskOutcome::Failed(err) => {
                warn!(task = %id, error = %err, "task failed");
                self.tasks[i].status = TaskStatus::Failed(err);
                step.newly_failed.push(id.clone());

                if !self.options.continue_on_failure {
                    let skipped = self.manager().skip_dependents(id);
                    if !skipped.is_empty() {
                        info!(task = %id, skipped = skipped.len(), "skipping dependents of failed task");
                    }
                    step.newly_skipped.extend(
                        skipped
                            .into_iter()
                            .map(|t| (t, SkipReason::UpstreamFailed(id.clone()))),
                    );
                }
            }
        }

        self.dispatch(&mut step);
        step.build_finished = self.is_finished();
        if step.build_finished {
            info!("all tasks terminal; build finished");
        }
        step
    }

    /// Mark every pending task `Skipped(Cancelled)`. Running tasks are left to
    /// report their own outcome.
    pub fn abort(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if !self.aborted {
            self.aborted = true;
            let skipped = self.manager().skip_pending(SkipReason::Cancelled);
            warn!(
                cancelled = skipped.len(),
                running = self.running_count(),
                "build aborted"
            );
            step.newly_skipped = skipped
                .into_iter()
                .map(|t| (t, SkipReason::Cancelled))
                .collect();
        }
        step.build_finished = self.is_finished();
        step
    }

    fn dispatch(&mut self, step: &mut SchedulerStep) {
        if self.aborted {
            return;
        }
        let capacity = self.options.max_parallel.saturating_sub(self.running_count());
        let ready = self.manager().collect_ready(capacity);

        for task in &ready.scheduled {
            info!(task = %task.id, "scheduling task");
        }
        step.newly_skipped.extend(ready.skipped);
        step.newly_scheduled.extend(ready.scheduled);
    }

    /// Append `finalizer` and its not-yet-planned `dependsOn` closure.
    fn add_finalizer(&mut self, finalizer: &TaskId, trigger: &TaskId, step: &mut SchedulerStep) {
        if self.index.contains_key(finalizer) {
            debug!(task = %finalizer, trigger = %trigger, "finalizer already part of the build");
            return;
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.unplanned_postorder(finalizer, &mut visited, &mut order);

        for id in order {
            let Some(linked) = self.graph.task(&id) else {
                warn!(task = %id, "finalizer missing from task graph; ignoring");
                continue;
            };
            let mut info = TaskInfo::from_linked(linked, self.tasks.len(), self.options.default_timeout);
            info.dynamic = true;
            self.index.insert(id.clone(), self.tasks.len());
            self.tasks.push(info);

            info!(task = %id, trigger = %trigger, "finalizer added to build");
            step.newly_added.push(id.clone());

            if let Some(reason) = self.manager().skip_if_blocked(&id) {
                step.newly_skipped.push((id, reason));
            }
        }
    }

    /// Dependencies before dependents, skipping tasks already in the table.
    fn unplanned_postorder(&self, id: &TaskId, visited: &mut HashSet<TaskId>, out: &mut Vec<TaskId>) {
        if self.index.contains_key(id) || !visited.insert(id.clone()) {
            return;
        }
        if let Some(task) = self.graph.task(id) {
            for dep in &task.depends_on {
                self.unplanned_postorder(dep, visited, out);
            }
        }
        out.push(id.clone());
    }

    fn manager(&mut self) -> StateManager<'_> {
        StateManager::new(&mut self.tasks, &self.index, self.options.continue_on_failure)
    }

    fn read_only(&self) -> ReadOnlyStateManager<'_> {
        ReadOnlyStateManager::new(&self.tasks, &self.index, self.options.continue_on_failure)
    }
}
