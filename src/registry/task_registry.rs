// src/registry/task_registry.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use globset::GlobBuilder;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::dag::cycles::find_cycle;
use crate::errors::{ConfigError, ConfigResult};
use crate::graph::ModuleGraph;
use crate::registry::linked::{LinkedTask, TaskGraph};
use crate::registry::task_def::{TaskDef, TaskRef};
use crate::types::{ModuleId, TaskId};

/// Mutable collection of task definitions for one build.
///
/// Tasks are registered first and linked afterwards: references between
/// tasks stay unresolved until [`TaskRegistry::link`], so declaration order
/// across modules and plugins does not matter.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    modules: Arc<ModuleGraph>,
    /// Definitions in registration order.
    tasks: Vec<TaskDef>,
    index: HashMap<TaskId, usize>,
}

impl TaskRegistry {
    pub fn new(modules: Arc<ModuleGraph>) -> Self {
        Self {
            modules,
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn modules(&self) -> &ModuleGraph {
        &self.modules
    }

    /// Register a task by module and name with its ordering constraints.
    pub fn register_task(
        &mut self,
        module: &ModuleId,
        name: &str,
        depends_on: Vec<TaskRef>,
        finalized_by: Vec<TaskRef>,
    ) -> ConfigResult<TaskId> {
        let mut def = TaskDef::new(module.task(name));
        def.depends_on = depends_on;
        def.finalized_by = finalized_by;
        let id = def.id.clone();
        self.register(def)?;
        Ok(id)
    }

    /// Register a fully described task.
    pub fn register(&mut self, def: TaskDef) -> ConfigResult<()> {
        if !self.modules.contains(&def.id.module) {
            return Err(ConfigError::UnknownModule {
                module: def.id.module.to_string(),
                from: format!("task '{}'", def.id),
            });
        }
        if def.id.name.is_empty() || def.id.name.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "invalid task name '{}' in module '{}'",
                def.id.name, def.id.module
            )));
        }
        if self.index.contains_key(&def.id) {
            return Err(ConfigError::DuplicateTask(def.id));
        }

        debug!(task = %def.id, "task registered");
        self.index.insert(def.id.clone(), self.tasks.len());
        self.tasks.push(def);
        Ok(())
    }

    /// Mutate an already-registered task.
    pub fn configure(&mut self, id: &TaskId, f: impl FnOnce(&mut TaskDef)) -> ConfigResult<()> {
        match self.index.get(id) {
            Some(&i) => {
                f(&mut self.tasks[i]);
                Ok(())
            }
            None => Err(ConfigError::UnknownTask {
                reference: id.to_string(),
                from: "task configuration".to_string(),
            }),
        }
    }

    /// Register `id` as a lifecycle task unless it already exists.
    pub fn ensure_task(&mut self, id: TaskId) -> ConfigResult<()> {
        if self.contains(&id) {
            return Ok(());
        }
        self.register(TaskDef::new(id))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskDef> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// All definitions in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve every reference and freeze the registry into a [`TaskGraph`].
    ///
    /// Fails with `UnknownTask` for references that never resolved, with
    /// `IllegalTaskDependency` when a task depends on a task of a module that
    /// is not the same as, or upstream of, its own, and with
    /// `CyclicTaskDependency` when `dependsOn` edges form a cycle.
    pub fn link(self) -> ConfigResult<TaskGraph> {
        let mut upstream_cache: HashMap<ModuleId, HashSet<ModuleId>> = HashMap::new();
        let mut linked = Vec::with_capacity(self.tasks.len());

        for def in &self.tasks {
            let depends_on = self.resolve_refs(def, &def.depends_on)?;
            for dep in &depends_on {
                if dep.module == def.id.module {
                    continue;
                }
                let upstream = upstream_cache
                    .entry(def.id.module.clone())
                    .or_insert_with(|| self.modules.upstream_of(&def.id.module));
                if !upstream.contains(&dep.module) {
                    return Err(ConfigError::IllegalTaskDependency {
                        task: def.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }

            let finalized_by = self.resolve_refs(def, &def.finalized_by)?;

            linked.push(LinkedTask {
                id: def.id.clone(),
                action: def.action.clone(),
                depends_on,
                finalized_by,
                timeout: def.timeout,
                report: def.report.clone(),
                enabled: def.enabled,
                warnings_as_errors: def.warnings_as_errors,
                description: def.description.clone(),
                group: def.group.clone(),
            });
        }

        ensure_acyclic(&linked)?;
        Ok(TaskGraph::new(self.modules, linked))
    }

    fn resolve_refs(&self, def: &TaskDef, refs: &[TaskRef]) -> ConfigResult<Vec<TaskId>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();

        for reference in refs {
            match reference {
                TaskRef::Matching(pattern) => {
                    let matcher = GlobBuilder::new(pattern).build()?.compile_matcher();
                    let before = resolved.len();
                    for candidate in &self.tasks {
                        if candidate.id == def.id {
                            continue;
                        }
                        if matcher.is_match(candidate.id.to_string())
                            && seen.insert(candidate.id.clone())
                        {
                            resolved.push(candidate.id.clone());
                        }
                    }
                    if resolved.len() == before {
                        warn!(task = %def.id, pattern = %pattern, "task pattern matched no tasks");
                    }
                }
                other => {
                    let id = other
                        .as_task_id(&def.id.module)
                        .filter(|id| self.contains(id))
                        .ok_or_else(|| ConfigError::UnknownTask {
                            reference: other.to_string(),
                            from: format!("task '{}'", def.id),
                        })?;
                    if seen.insert(id.clone()) {
                        resolved.push(id);
                    }
                }
            }
        }

        Ok(resolved)
    }
}

/// Reject `dependsOn` cycles anywhere in the registry, planned or not.
fn ensure_acyclic(tasks: &[LinkedTask]) -> ConfigResult<()> {
    let index: HashMap<&TaskId, usize> = tasks.iter().enumerate().map(|(i, t)| (&t.id, i)).collect();

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for (i, task) in tasks.iter().enumerate() {
        graph.add_node(i);
        for dep in &task.depends_on {
            if let Some(&d) = index.get(dep) {
                graph.add_edge(d, i, ());
            }
        }
    }

    match find_cycle(&graph) {
        Some(cycle) => Err(ConfigError::CyclicTaskDependency {
            cycle: cycle
                .iter()
                .map(|&i| tasks[i].id.to_string())
                .collect::<Vec<_>>()
                .join(" -> "),
        }),
        None => Ok(()),
    }
}
