// src/registry/task_def.rs

//! Task definitions as registered, before references are linked.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{ModuleId, TaskId};

/// What a task does when it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    /// No work of its own; only aggregates its dependencies (e.g. `build`,
    /// `testAll`). Succeeds immediately once dispatched.
    Lifecycle,
    /// Shell command run through `sh -c` (or `cmd /C` on Windows).
    Command(String),
}

/// An unresolved reference to one or more tasks.
///
/// References are bound lazily by [`crate::registry::TaskRegistry::link`],
/// after every module and plugin has registered its tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// Fully-qualified id, e.g. `:core:test`.
    Id(TaskId),
    /// Name relative to the referencing task's module, e.g. `test`.
    Relative(String),
    /// Glob over fully-qualified ids, e.g. `:*:test`. Evaluated at link time.
    Matching(String),
}

impl TaskRef {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.contains(['*', '?', '[', '{']) {
            let pattern = if s.starts_with(':') {
                s.to_string()
            } else {
                format!(":{s}")
            };
            return TaskRef::Matching(pattern);
        }

        match TaskId::parse(s) {
            Some(id) => TaskRef::Id(id),
            None => TaskRef::Relative(s.to_string()),
        }
    }

    /// Resolve a non-pattern reference against the module of the referencing task.
    pub fn as_task_id(&self, module: &ModuleId) -> Option<TaskId> {
        match self {
            TaskRef::Id(id) => Some(id.clone()),
            TaskRef::Relative(name) => Some(module.task(name)),
            TaskRef::Matching(_) => None,
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRef::Id(id) => write!(f, "{id}"),
            TaskRef::Relative(name) => f.write_str(name),
            TaskRef::Matching(pattern) => f.write_str(pattern),
        }
    }
}

impl From<&str> for TaskRef {
    fn from(s: &str) -> Self {
        TaskRef::parse(s)
    }
}

impl From<TaskId> for TaskRef {
    fn from(id: TaskId) -> Self {
        TaskRef::Id(id)
    }
}

/// A task as declared by configuration or a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDef {
    pub id: TaskId,
    pub action: TaskAction,
    /// Predecessors that must succeed first.
    pub depends_on: Vec<TaskRef>,
    /// Follow-up tasks to run once this one has succeeded.
    pub finalized_by: Vec<TaskRef>,
    /// Per-task deadline; falls back to the build default when `None`.
    pub timeout: Option<Duration>,
    /// Report fragment written by the task, loaded after it succeeds.
    pub report: Option<PathBuf>,
    /// Disabled tasks are never run and end `Skipped`.
    pub enabled: bool,
    /// Fail the task if its output contains a compiler warning.
    pub warnings_as_errors: bool,
    pub description: Option<String>,
    pub group: Option<String>,
}

impl TaskDef {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            action: TaskAction::Lifecycle,
            depends_on: Vec::new(),
            finalized_by: Vec::new(),
            timeout: None,
            report: None,
            enabled: true,
            warnings_as_errors: false,
            description: None,
            group: None,
        }
    }

    pub fn command(mut self, cmd: impl Into<String>) -> Self {
        self.action = TaskAction::Command(cmd.into());
        self
    }

    pub fn depends_on(mut self, reference: impl Into<TaskRef>) -> Self {
        self.depends_on.push(reference.into());
        self
    }

    pub fn finalized_by(mut self, reference: impl Into<TaskRef>) -> Self {
        self.finalized_by.push(reference.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}
