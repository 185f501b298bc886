// src/config/project.rs

//! Turn a validated [`ConfigFile`] into a linked [`TaskGraph`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::model::{BuildSettings, ConfigFile, TaskSpec};
use crate::errors::ConfigResult;
use crate::graph::{Module, ModuleGraph};
use crate::registry::{PluginSet, TaskAction, TaskDef, TaskGraph, TaskRegistry};
use crate::types::ModuleId;

/// A configured build: its settings and every task, linked.
#[derive(Debug, Clone)]
pub struct Project {
    pub settings: BuildSettings,
    pub tasks: Arc<TaskGraph>,
}

impl Project {
    /// Build the project with the built-in plugins.
    pub fn from_config(config: ConfigFile) -> ConfigResult<Self> {
        Self::with_plugins(config, &PluginSet::builtin())
    }

    /// Build the project, resolving plugin names against `plugins`.
    ///
    /// Order: module graph (with the root project `:` downstream of every
    /// module), then per module the `[subprojects]` plugins, its own plugins
    /// and its task sections, then the root tasks, then linking.
    pub fn with_plugins(config: ConfigFile, plugins: &PluginSet) -> ConfigResult<Self> {
        let modules = Arc::new(build_module_graph(&config)?);
        let mut registry = TaskRegistry::new(Arc::clone(&modules));

        for module in &config.modules {
            let mut applied: Vec<&str> = Vec::new();
            for plugin in config.subprojects.iter().chain(module.plugins.iter()) {
                if applied.contains(&plugin.as_str()) {
                    continue;
                }
                plugins.apply(plugin, &module.id, &mut registry)?;
                applied.push(plugin);
            }

            for task in &module.tasks {
                apply_task_spec(&mut registry, &module.id, task)?;
            }
        }

        let root = ModuleId::root();
        for task in &config.root_tasks {
            apply_task_spec(&mut registry, &root, task)?;
        }

        let tasks = registry.link()?;
        info!(
            modules = config.modules.len(),
            tasks = tasks.len(),
            "project configured"
        );

        Ok(Self {
            settings: config.build,
            tasks: Arc::new(tasks),
        })
    }
}

fn build_module_graph(config: &ConfigFile) -> ConfigResult<ModuleGraph> {
    let mut graph = ModuleGraph::new();
    for spec in &config.modules {
        let mut module = Module::new(spec.id.clone(), spec.depends_on.clone());
        module.description = spec.description.clone();
        module.plugins = spec.plugins.clone();
        graph.insert(module)?;
    }

    let all: Vec<ModuleId> = config.modules.iter().map(|m| m.id.clone()).collect();
    graph.add_module(ModuleId::root(), all)?;
    graph.ensure_complete()?;
    Ok(graph)
}

/// Register the task, or override the fields the section sets on an existing one.
fn apply_task_spec(registry: &mut TaskRegistry, module: &ModuleId, spec: &TaskSpec) -> ConfigResult<()> {
    let id = module.task(&spec.name);

    if !registry.contains(&id) {
        registry.register(TaskDef::new(id.clone()))?;
    } else {
        debug!(task = %id, "configuring existing task");
    }

    registry.configure(&id, |def| {
        if let Some(cmd) = &spec.cmd {
            def.action = TaskAction::Command(cmd.clone());
        }
        def.depends_on.extend(spec.depends_on.iter().cloned());
        def.finalized_by.extend(spec.finalized_by.iter().cloned());
        if spec.timeout.is_some() {
            def.timeout = spec.timeout;
        }
        if spec.report.is_some() {
            def.report = spec.report.clone();
        }
        if let Some(enabled) = spec.enabled {
            def.enabled = enabled;
        }
        if let Some(werror) = spec.warnings_as_errors {
            def.warnings_as_errors = werror;
        }
        if spec.description.is_some() {
            def.description = spec.description.clone();
        }
        if spec.group.is_some() {
            def.group = spec.group.clone();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;
    use crate::errors::ConfigError;

    fn project(toml_str: &str) -> ConfigResult<Project> {
        let raw: RawConfigFile = toml::from_str(toml_str)?;
        Project::from_config(ConfigFile::try_from(raw)?)
    }

    #[test]
    fn plugins_and_overrides_combine() {
        let project = project(
            r#"
            [subprojects]
            plugins = ["java", "jacoco"]

            [module.core]

            [module.core.task.test]
            cmd = "true"
            "#,
        )
        .unwrap();

        let test = project.tasks.task(&ModuleId::new("core").task("test")).unwrap();
        assert_eq!(test.action, TaskAction::Command("true".into()));
        assert_eq!(test.depends_on, vec![ModuleId::new("core").task("compileJava")]);
        assert_eq!(
            test.finalized_by,
            vec![ModuleId::new("core").task("jacocoTestReport")]
        );
    }

    #[test]
    fn root_tasks_may_aggregate_every_module() {
        let project = project(
            r#"
            [module.core.task.test]
            [module.api]
            depends_on = ["core"]
            [module.api.task.test]

            [task.testAll]
            depends_on = [":*:test"]
            "#,
        )
        .unwrap();

        let all = project.tasks.task(&ModuleId::root().task("testAll")).unwrap();
        assert_eq!(
            all.depends_on,
            vec![
                ModuleId::new("core").task("test"),
                ModuleId::new("api").task("test"),
            ]
        );
    }

    #[test]
    fn unknown_plugin_is_a_config_error() {
        let err = project(
            r#"
            [module.core]
            plugins = ["kotlin"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlugin { .. }));
    }

    #[test]
    fn downstream_task_reference_is_illegal() {
        let err = project(
            r#"
            [module.core.task.test]
            depends_on = [":api:test"]
            [module.api]
            depends_on = ["core"]
            [module.api.task.test]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::IllegalTaskDependency { .. }));
    }

    #[test]
    fn module_selectors_select_without_naming() {
        let project = project(
            r#"
            [module.web.task.test]
            finalized_by = ["report"]
            [module.web.task.report]
            "#,
        )
        .unwrap();
        let web = ModuleId::new("web");

        let selectors = vec!["web".to_string()];
        assert_eq!(
            project.tasks.select(&selectors).unwrap(),
            vec![web.task("test"), web.task("report")]
        );
        assert!(project.tasks.named(&selectors).unwrap().is_empty());

        let selectors = vec!["web:report".to_string(), "test".to_string()];
        assert_eq!(
            project.tasks.named(&selectors).unwrap(),
            vec![web.task("report"), web.task("test")]
        );
    }
}
