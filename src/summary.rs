// src/summary.rs

//! Final per-task statuses of a build and the overall result.

use std::fmt;

use crate::dag::{SkipReason, TaskStatus};
use crate::errors::TaskError;
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    Failed,
}

impl BuildResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildResult::Success => 0,
            BuildResult::Failed => 1,
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildResult::Success => f.write_str("BUILD SUCCESSFUL"),
            BuildResult::Failed => f.write_str("BUILD FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Joined the build at runtime as a finalizer or a finalizer's dependency.
    pub finalizer: bool,
}

/// Every task of a build with its terminal status, in dispatch-rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    tasks: Vec<TaskSummary>,
}

impl BuildSummary {
    pub fn new(tasks: Vec<TaskSummary>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[TaskSummary] {
        &self.tasks
    }

    pub fn status_of(&self, id: &TaskId) -> Option<&TaskStatus> {
        self.tasks.iter().find(|t| &t.id == id).map(|t| &t.status)
    }

    /// `Success` iff no task ended `Failed`.
    pub fn result(&self) -> BuildResult {
        if self.failed().next().is_some() {
            BuildResult::Failed
        } else {
            BuildResult::Success
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.result().exit_code()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&TaskId, &TaskError)> {
        self.tasks.iter().filter_map(|t| match &t.status {
            TaskStatus::Failed(err) => Some((&t.id, err)),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&TaskId, &SkipReason)> {
        self.tasks.iter().filter_map(|t| match &t.status {
            TaskStatus::Skipped(reason) => Some((&t.id, reason)),
            _ => None,
        })
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
            .map(|t| &t.id)
    }
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for task in &self.tasks {
            writeln!(f, "{:<40} {}", task.id.to_string(), task.status)?;
        }

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "What went wrong:")?;
            for (id, err) in failed {
                writeln!(f, "  Execution failed for task '{id}': {err}")?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "{} ({} succeeded, {} failed, {} skipped)",
            self.result(),
            self.succeeded().count(),
            self.failed().count(),
            self.skipped().count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleId;

    #[test]
    fn any_failure_fails_the_build() {
        let core = ModuleId::new("core");
        let summary = BuildSummary::new(vec![
            TaskSummary {
                id: core.task("compileJava"),
                status: TaskStatus::Succeeded,
                finalizer: false,
            },
            TaskSummary {
                id: core.task("test"),
                status: TaskStatus::Failed(TaskError::ExitStatus(1)),
                finalizer: false,
            },
        ]);

        assert_eq!(summary.result(), BuildResult::Failed);
        assert_eq!(summary.exit_code(), 1);
        assert!(summary.to_string().contains("Execution failed for task ':core:test'"));
    }

    #[test]
    fn skipped_tasks_do_not_fail_the_build() {
        let summary = BuildSummary::new(vec![TaskSummary {
            id: ModuleId::new("core").task("jar"),
            status: TaskStatus::Skipped(SkipReason::Disabled),
            finalizer: false,
        }]);
        assert_eq!(summary.result(), BuildResult::Success);
    }
}
