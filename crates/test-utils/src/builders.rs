#![allow(dead_code)]

use std::sync::Arc;

use buildgraph::config::loader::parse_str;
use buildgraph::config::{ConfigFile, Project};
use buildgraph::errors::ConfigResult;
use buildgraph::graph::ModuleGraph;
use buildgraph::registry::{TaskDef, TaskGraph, TaskRegistry};
use buildgraph::types::{ModuleId, TaskId};

/// Parse `web:test`, `:web:test` or `:testAll`. Panics on anything else.
pub fn tid(s: &str) -> TaskId {
    TaskId::parse(s).unwrap_or_else(|| panic!("not a task id: {s}"))
}

/// A lifecycle task definition for `id`; chain `TaskDef` builders onto it.
pub fn task(id: &str) -> TaskDef {
    TaskDef::new(tid(id))
}

/// Builder for a linked `TaskGraph`, skipping the TOML layer.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    modules: Vec<(ModuleId, Vec<ModuleId>)>,
    tasks: Vec<TaskDef>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, name: &str, deps: &[&str]) -> Self {
        let deps = deps.iter().map(|d| ModuleId::new(d)).collect();
        self.modules.push((ModuleId::new(name), deps));
        self
    }

    pub fn task(mut self, def: TaskDef) -> Self {
        self.tasks.push(def);
        self
    }

    /// Shorthand for a command task with `depends_on` references.
    pub fn command(self, id: &str, cmd: &str, deps: &[&str]) -> Self {
        let def = deps
            .iter()
            .fold(task(id).command(cmd), |def, dep| def.depends_on(*dep));
        self.task(def)
    }

    pub fn try_build(self) -> ConfigResult<TaskGraph> {
        let mut modules = ModuleGraph::new();
        for (id, deps) in self.modules {
            modules.add_module(id, deps)?;
        }
        modules.ensure_complete()?;

        let mut registry = TaskRegistry::new(Arc::new(modules));
        for def in self.tasks {
            registry.register(def)?;
        }
        registry.link()
    }

    pub fn build(self) -> Arc<TaskGraph> {
        Arc::new(self.try_build().expect("Failed to build valid task graph from builder"))
    }
}

/// `core` <- `api` <- `web`, each with a `test` task depending on the
/// upstream module's `test`; `web:test` is finalized by `web:report`.
pub fn webapp() -> Arc<TaskGraph> {
    GraphBuilder::new()
        .module("core", &[])
        .module("api", &["core"])
        .module("web", &["api"])
        .command("core:test", "test core", &[])
        .command("api:test", "test api", &["core:test"])
        .task(
            task("web:test")
                .command("test web")
                .depends_on("api:test")
                .finalized_by("web:report"),
        )
        .command("web:report", "report web", &[])
        .build()
}

pub fn config_from_str(toml_str: &str) -> ConfigFile {
    let raw = parse_str(toml_str).expect("Failed to parse TOML");
    ConfigFile::try_from(raw).expect("Failed to build valid config")
}

pub fn project_from_str(toml_str: &str) -> Project {
    Project::from_config(config_from_str(toml_str)).expect("Failed to link project")
}
