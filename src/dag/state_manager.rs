// src/dag/state_manager.rs

//! Status transitions for the tasks of one build.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::dag::task_info::{ScheduledTask, SkipReason, TaskInfo, TaskStatus};
use crate::types::TaskId;

/// Tasks picked by one [`StateManager::collect_ready`] pass.
#[derive(Debug, Default)]
pub struct ReadySet {
    pub scheduled: Vec<ScheduledTask>,
    /// Tasks whose turn came but that will not run: disabled tasks and
    /// finalizers none of whose triggers succeeded.
    pub skipped: Vec<(TaskId, SkipReason)>,
}

/// Manages status transitions over the scheduler's task table.
pub struct StateManager<'a> {
    tasks: &'a mut [TaskInfo],
    index: &'a HashMap<TaskId, usize>,
    continue_on_failure: bool,
}

impl<'a> StateManager<'a> {
    pub fn new(
        tasks: &'a mut [TaskInfo],
        index: &'a HashMap<TaskId, usize>,
        continue_on_failure: bool,
    ) -> Self {
        Self {
            tasks,
            index,
            continue_on_failure,
        }
    }

    fn read_only(&self) -> ReadOnlyStateManager<'_> {
        ReadOnlyStateManager::new(self.tasks, self.index, self.continue_on_failure)
    }

    /// Mark every pending task that transitively `dependsOn` `failed` as
    /// `Skipped(UpstreamFailed(failed))`. Returns the newly skipped tasks.
    pub fn skip_dependents(&mut self, failed: &TaskId) -> Vec<TaskId> {
        let mut queue: VecDeque<TaskId> = VecDeque::from([failed.clone()]);
        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut skipped = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            for info in self.tasks.iter_mut() {
                if info.status != TaskStatus::Pending || !info.hard_deps.contains(&current) {
                    continue;
                }
                debug!(
                    task = %info.id,
                    upstream = %failed,
                    "skipping dependent of failed task"
                );
                info.status = TaskStatus::Skipped(SkipReason::UpstreamFailed(failed.clone()));
                skipped.push(info.id.clone());
                queue.push_back(info.id.clone());
            }
        }

        skipped
    }

    /// Mark every pending task `Skipped(reason)`.
    pub fn skip_pending(&mut self, reason: SkipReason) -> Vec<TaskId> {
        let mut skipped = Vec::new();
        for info in self.tasks.iter_mut() {
            if info.status == TaskStatus::Pending {
                info.status = TaskStatus::Skipped(reason.clone());
                skipped.push(info.id.clone());
            }
        }
        skipped
    }

    /// Skip `id` if one of its hard predecessors already failed (or was
    /// skipped because of a failure). Used for tasks added mid-build.
    pub fn skip_if_blocked(&mut self, id: &TaskId) -> Option<SkipReason> {
        let &i = self.index.get(id)?;
        let cause = self.read_only().upstream_failure(&self.tasks[i])?;
        let reason = SkipReason::UpstreamFailed(cause);
        self.tasks[i].status = TaskStatus::Skipped(reason.clone());
        Some(reason)
    }

    /// Pick up to `capacity` eligible tasks in rank order and mark them `Running`.
    ///
    /// Eligible disabled tasks, and planned finalizers whose triggers all
    /// finished without success, are skipped without using capacity. Since
    /// that may unblock their dependents the scan repeats until nothing
    /// changes.
    pub fn collect_ready(&mut self, mut capacity: usize) -> ReadySet {
        let mut ready = ReadySet::default();

        loop {
            let mut unblocked = false;

            for i in 0..self.tasks.len() {
                if self.tasks[i].status != TaskStatus::Pending {
                    continue;
                }
                if !self.read_only().deps_satisfied(&self.tasks[i]) {
                    continue;
                }

                let triggered = self.read_only().triggered(&self.tasks[i]);
                let info = &mut self.tasks[i];
                let skip = if !info.enabled {
                    info!(task = %info.id, "task disabled; skipping");
                    Some(SkipReason::Disabled)
                } else if !triggered {
                    info!(task = %info.id, "no trigger succeeded; skipping finalizer");
                    Some(SkipReason::NotTriggered)
                } else {
                    None
                };
                if let Some(reason) = skip {
                    info.status = TaskStatus::Skipped(reason.clone());
                    ready.skipped.push((info.id.clone(), reason));
                    unblocked = true;
                    continue;
                }

                if capacity == 0 {
                    continue;
                }

                debug!(task = %info.id, rank = info.rank, "dependencies satisfied; marking Running");
                info.status = TaskStatus::Running;
                ready.scheduled.push(ScheduledTask::from_task_info(info));
                capacity -= 1;
            }

            if !unblocked {
                break;
            }
        }

        ready
    }

    pub fn running_count(&self) -> usize {
        self.read_only().running_count()
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.read_only().all_tasks_terminal()
    }
}

/// Read-only view for callers that only hold shared access to the table.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a [TaskInfo],
    index: &'a HashMap<TaskId, usize>,
    continue_on_failure: bool,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(
        tasks: &'a [TaskInfo],
        index: &'a HashMap<TaskId, usize>,
        continue_on_failure: bool,
    ) -> Self {
        Self {
            tasks,
            index,
            continue_on_failure,
        }
    }

    fn status(&self, id: &TaskId) -> Option<&TaskStatus> {
        self.index.get(id).map(|&i| &self.tasks[i].status)
    }

    /// Whether `info` may start: hard predecessors succeeded (or are merely
    /// finished under `continue_on_failure`), soft predecessors finished.
    pub fn deps_satisfied(&self, info: &TaskInfo) -> bool {
        for dep in &info.hard_deps {
            let Some(status) = self.status(dep) else {
                warn!(task = %info.id, dep = %dep, "dependency missing from task table");
                return false;
            };
            let ok = if self.continue_on_failure {
                status.is_terminal()
            } else {
                status.satisfies_dependents()
            };
            if !ok {
                return false;
            }
        }

        info.soft_deps
            .iter()
            .all(|dep| self.status(dep).is_none_or(TaskStatus::is_terminal))
    }

    /// Whether a finalizer may run once its dependencies are satisfied: it was
    /// named directly, has no planned trigger, or one trigger succeeded.
    pub fn triggered(&self, info: &TaskInfo) -> bool {
        info.named
            || info.triggers.is_empty()
            || info
                .triggers
                .iter()
                .any(|t| self.status(t) == Some(&TaskStatus::Succeeded))
    }

    /// The failed task blocking `info`, if any.
    pub fn upstream_failure(&self, info: &TaskInfo) -> Option<TaskId> {
        if self.continue_on_failure {
            return None;
        }
        info.hard_deps.iter().find_map(|dep| match self.status(dep)? {
            TaskStatus::Failed(_) => Some(dep.clone()),
            TaskStatus::Skipped(SkipReason::UpstreamFailed(cause)) => Some(cause.clone()),
            TaskStatus::Skipped(SkipReason::Cancelled) => Some(dep.clone()),
            _ => None,
        })
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }
}
