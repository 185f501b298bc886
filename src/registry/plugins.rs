// src/registry/plugins.rs

//! Plugins as registration callbacks.
//!
//! A plugin is a function that, given a module, registers tasks and edges in
//! the [`TaskRegistry`]. Plugins are looked up by name when a module (or the
//! `[subprojects]` section) applies them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{ConfigError, ConfigResult};
use crate::registry::task_def::{TaskDef, TaskRef};
use crate::registry::task_registry::TaskRegistry;
use crate::types::ModuleId;

pub type PluginFn = Arc<dyn Fn(&ModuleId, &mut TaskRegistry) -> ConfigResult<()> + Send + Sync>;

/// Named plugins available to a build.
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: BTreeMap<String, PluginFn>,
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSet")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `java`, `jacoco` and `spring-boot` plugins.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.register("java", java);
        set.register("jacoco", jacoco);
        set.register("spring-boot", spring_boot);
        set
    }

    pub fn register<F>(&mut self, name: &str, plugin: F)
    where
        F: Fn(&ModuleId, &mut TaskRegistry) -> ConfigResult<()> + Send + Sync + 'static,
    {
        self.plugins.insert(name.to_string(), Arc::new(plugin));
    }

    /// Apply the named plugin to `module`.
    pub fn apply(&self, name: &str, module: &ModuleId, registry: &mut TaskRegistry) -> ConfigResult<()> {
        let plugin = self
            .plugins
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPlugin {
                plugin: name.to_string(),
                module: module.clone(),
            })?;
        debug!(plugin = name, module = %module, "applying plugin");
        plugin(module, registry)
    }
}

/// `compileJava`, `test`, `jar` and the `build` lifecycle task.
fn java(module: &ModuleId, registry: &mut TaskRegistry) -> ConfigResult<()> {
    registry.ensure_task(module.task("compileJava"))?;
    register_missing(
        registry,
        TaskDef::new(module.task("test"))
            .depends_on(TaskRef::Relative("compileJava".into()))
            .group("verification"),
    )?;
    register_missing(
        registry,
        TaskDef::new(module.task("jar"))
            .depends_on(TaskRef::Relative("compileJava".into()))
            .group("build"),
    )?;
    register_missing(
        registry,
        TaskDef::new(module.task("build"))
            .depends_on(TaskRef::Relative("jar".into()))
            .depends_on(TaskRef::Relative("test".into()))
            .group("build"),
    )
}

/// `jacocoTestReport` after `test`, which is finalized by it.
fn jacoco(module: &ModuleId, registry: &mut TaskRegistry) -> ConfigResult<()> {
    register_missing(
        registry,
        TaskDef::new(module.task("jacocoTestReport"))
            .depends_on(TaskRef::Relative("test".into()))
            .group("verification"),
    )?;

    let test = module.task("test");
    if registry.contains(&test) {
        registry.configure(&test, |def| {
            def.finalized_by
                .push(TaskRef::Relative("jacocoTestReport".into()));
        })?;
    }
    Ok(())
}

/// `bootJar`, wired into `build` when the module has one.
fn spring_boot(module: &ModuleId, registry: &mut TaskRegistry) -> ConfigResult<()> {
    register_missing(
        registry,
        TaskDef::new(module.task("bootJar"))
            .depends_on(TaskRef::Relative("compileJava".into()))
            .group("build"),
    )?;

    let build = module.task("build");
    if registry.contains(&build) {
        registry.configure(&build, |def| {
            def.depends_on.push(TaskRef::Relative("bootJar".into()));
        })?;
    }
    Ok(())
}

fn register_missing(registry: &mut TaskRegistry, def: TaskDef) -> ConfigResult<()> {
    if registry.contains(&def.id) {
        return Ok(());
    }
    registry.register(def)
}
