// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::{ScheduledTask, SkipReason};
use crate::types::TaskId;

/// Structured result of a single scheduler "step".
///
/// Tests use it to step the build by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready and were marked `Running` in this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks whose completion in this step was a failure.
    pub newly_failed: Vec<TaskId>,
    /// Tasks marked `Skipped` in this step, with the reason.
    pub newly_skipped: Vec<(TaskId, SkipReason)>,
    /// Finalizers (and their dependencies) added to the build in this step.
    pub newly_added: Vec<TaskId>,
    /// Whether every task is now terminal.
    pub build_finished: bool,
}

impl SchedulerStep {
    pub fn scheduled_ids(&self) -> Vec<TaskId> {
        self.newly_scheduled.iter().map(|t| t.id.clone()).collect()
    }

    pub fn skipped_ids(&self) -> Vec<TaskId> {
        self.newly_skipped.iter().map(|(id, _)| id.clone()).collect()
    }
}
