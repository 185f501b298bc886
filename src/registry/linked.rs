// src/registry/linked.rs

//! Immutable task graph produced by linking a [`crate::registry::TaskRegistry`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ConfigError, ConfigResult};
use crate::graph::ModuleGraph;
use crate::registry::task_def::TaskAction;
use crate::types::{ModuleId, TaskId};

/// A task whose references have all been resolved to concrete ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedTask {
    pub id: TaskId,
    pub action: TaskAction,
    pub depends_on: Vec<TaskId>,
    pub finalized_by: Vec<TaskId>,
    pub timeout: Option<Duration>,
    pub report: Option<PathBuf>,
    pub enabled: bool,
    pub warnings_as_errors: bool,
    pub description: Option<String>,
    pub group: Option<String>,
}

/// Tasks matched by one command-line selector.
struct Selection {
    tasks: Vec<TaskId>,
    /// Matched as a module path.
    module: bool,
}

impl Selection {
    fn tasks(tasks: Vec<TaskId>) -> Self {
        Self {
            tasks,
            module: false,
        }
    }
}

/// Every task of the build with resolved `dependsOn` / `finalizedBy` edges.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    modules: Arc<ModuleGraph>,
    tasks: Vec<LinkedTask>,
    index: HashMap<TaskId, usize>,
}

impl TaskGraph {
    pub(crate) fn new(modules: Arc<ModuleGraph>, tasks: Vec<LinkedTask>) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self {
            modules,
            tasks,
            index,
        }
    }

    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    pub fn task(&self, id: &TaskId) -> Option<&LinkedTask> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// All tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &LinkedTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks_of<'a>(&'a self, module: &'a ModuleId) -> impl Iterator<Item = &'a LinkedTask> {
        self.tasks.iter().filter(move |t| &t.id.module == module)
    }

    pub fn all_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }

    /// Resolve command-line selectors to the tasks they name.
    ///
    /// - a module path (`web`, `:web`) selects every task of that module;
    /// - a task path (`web:test`, `:testAll`) selects that task;
    /// - a bare name that is not a module selects every task with that name.
    pub fn select(&self, selectors: &[String]) -> ConfigResult<Vec<TaskId>> {
        let mut selected = Vec::new();
        let mut seen = HashSet::new();

        for selector in selectors {
            for id in self.select_one(selector)?.tasks {
                if seen.insert(id.clone()) {
                    selected.push(id);
                }
            }
        }

        Ok(selected)
    }

    /// The tasks that task-path or bare-name selectors name directly.
    /// Module selectors name none.
    pub fn named(&self, selectors: &[String]) -> ConfigResult<Vec<TaskId>> {
        let mut named = Vec::new();
        for selector in selectors {
            let selection = self.select_one(selector)?;
            if !selection.module {
                named.extend(selection.tasks);
            }
        }
        Ok(named)
    }

    fn select_one(&self, selector: &str) -> ConfigResult<Selection> {
        let selector = selector.trim();
        let unknown = || ConfigError::UnknownTask {
            reference: selector.to_string(),
            from: "command line".to_string(),
        };

        let module = ModuleId::new(selector);
        if self.modules.contains(&module) && (selector.contains(':') || !module.is_root()) {
            return Ok(Selection {
                tasks: self.tasks_of(&module).map(|t| t.id.clone()).collect(),
                module: true,
            });
        }

        if selector.contains(':') {
            let id = TaskId::parse(selector).ok_or_else(unknown)?;
            return if self.contains(&id) {
                Ok(Selection::tasks(vec![id]))
            } else {
                Err(unknown())
            };
        }

        let named: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.id.name == selector)
            .map(|t| t.id.clone())
            .collect();

        if named.is_empty() {
            Err(unknown())
        } else {
            Ok(Selection::tasks(named))
        }
    }

    /// The given tasks plus everything they transitively depend on.
    pub fn dependency_closure(&self, roots: &[TaskId]) -> HashSet<TaskId> {
        let mut needed = HashSet::new();
        let mut queue: VecDeque<&TaskId> = roots.iter().collect();

        while let Some(current) = queue.pop_front() {
            if !needed.insert(current.clone()) {
                continue;
            }
            if let Some(task) = self.task(current) {
                for dep in &task.depends_on {
                    if !needed.contains(dep) {
                        queue.push_back(dep);
                    }
                }
            }
        }

        needed
    }
}
