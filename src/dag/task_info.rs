// src/dag/task_info.rs

//! Task status and the per-build scheduling record.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::TaskError;
use crate::registry::{LinkedTask, TaskAction};
use crate::types::TaskId;

/// Why a task ended without running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A task this one (transitively) depends on failed; names the task that failed.
    UpstreamFailed(TaskId),
    /// `enabled = false`.
    Disabled,
    /// The build was aborted before the task started.
    Cancelled,
    /// A finalizer none of whose triggers succeeded.
    NotTriggered,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed(id) => write!(f, "upstream task {id} failed"),
            SkipReason::Disabled => f.write_str("disabled"),
            SkipReason::Cancelled => f.write_str("build cancelled"),
            SkipReason::NotTriggered => f.write_str("no trigger succeeded"),
        }
    }
}

/// Status of a task within one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed(TaskError),
    Skipped(SkipReason),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    /// Whether dependents may run after this status without `continue_on_failure`.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded
                | TaskStatus::Skipped(SkipReason::Disabled | SkipReason::NotTriggered)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Succeeded => "SUCCESS",
            TaskStatus::Failed(_) => "FAILED",
            TaskStatus::Skipped(_) => "SKIPPED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Failed(err) => write!(f, "FAILED ({err})"),
            TaskStatus::Skipped(reason) => write!(f, "SKIPPED ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// A planned task together with its status for this build.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    /// Dispatch priority: static plan order, then insertion order for
    /// finalizers added while the build runs.
    pub rank: usize,
    /// `dependsOn` predecessors.
    pub hard_deps: Vec<TaskId>,
    /// Ordering-only predecessors (implied module order, planned finalizers).
    pub soft_deps: Vec<TaskId>,
    pub finalized_by: Vec<TaskId>,
    /// Planned tasks this one finalizes. Unless `named`, it only runs once
    /// one of them succeeded.
    pub triggers: Vec<TaskId>,
    /// Named directly on the command line.
    pub named: bool,
    pub action: TaskAction,
    pub timeout: Option<Duration>,
    pub report: Option<PathBuf>,
    pub enabled: bool,
    pub warnings_as_errors: bool,
    /// Added at runtime as a finalizer (or a finalizer's dependency).
    pub dynamic: bool,
    pub status: TaskStatus,
}

impl TaskInfo {
    pub fn from_linked(task: &LinkedTask, rank: usize, default_timeout: Option<Duration>) -> Self {
        Self {
            id: task.id.clone(),
            rank,
            hard_deps: task.depends_on.clone(),
            soft_deps: Vec::new(),
            finalized_by: task.finalized_by.clone(),
            triggers: Vec::new(),
            named: false,
            action: task.action.clone(),
            timeout: task.timeout.or(default_timeout),
            report: task.report.clone(),
            enabled: task.enabled,
            warnings_as_errors: task.warnings_as_errors,
            dynamic: false,
            status: TaskStatus::Pending,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub action: TaskAction,
    pub timeout: Option<Duration>,
    pub report: Option<PathBuf>,
    pub warnings_as_errors: bool,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            id: info.id.clone(),
            action: info.action.clone(),
            timeout: info.timeout,
            report: info.report.clone(),
            warnings_as_errors: info.warnings_as_errors,
        }
    }
}
