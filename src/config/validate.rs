// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    BuildSettings, ConfigFile, DEFAULT_WARNING_PATTERN, ModuleSpec, RawConfigFile, TaskConfig,
    TaskSpec,
};
use crate::errors::{ConfigError, ConfigResult};
use crate::registry::TaskRef;
use crate::types::ModuleId;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ConfigError;

    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        ensure_has_modules(&raw)?;
        let build = validate_build_section(&raw)?;
        validate_module_names(&raw)?;
        validate_module_dependencies(&raw)?;

        let modules = raw
            .module
            .iter()
            .map(|(name, module)| {
                let id = ModuleId::new(name);
                let tasks = module
                    .task
                    .iter()
                    .map(|(task, cfg)| task_spec(&id, task, cfg))
                    .collect::<ConfigResult<Vec<_>>>()?;
                Ok(ModuleSpec {
                    depends_on: module.depends_on.iter().map(|d| ModuleId::new(d)).collect(),
                    description: module.description.clone(),
                    plugins: module.plugins.clone(),
                    tasks,
                    id,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        let root = ModuleId::root();
        let root_tasks = raw
            .task
            .iter()
            .map(|(task, cfg)| task_spec(&root, task, cfg))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(ConfigFile::new_unchecked(
            build,
            raw.subprojects.plugins,
            modules,
            root_tasks,
        ))
    }
}

fn ensure_has_modules(cfg: &RawConfigFile) -> ConfigResult<()> {
    if cfg.module.is_empty() {
        return Err(ConfigError::Invalid(
            "config must contain at least one [module.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_section(cfg: &RawConfigFile) -> ConfigResult<BuildSettings> {
    if cfg.build.workers == Some(0) {
        return Err(ConfigError::Invalid(
            "[build].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let default_timeout = cfg
        .build
        .default_timeout
        .as_deref()
        .map(|s| parse_duration(s, "[build].default_timeout"))
        .transpose()?;

    let pattern = cfg
        .build
        .warning_pattern
        .as_deref()
        .unwrap_or(DEFAULT_WARNING_PATTERN);
    let warning_pattern = Regex::new(pattern).map_err(|e| {
        ConfigError::Invalid(format!("[build].warning_pattern is not a valid regex: {e}"))
    })?;

    Ok(BuildSettings {
        workers: cfg.build.workers,
        default_timeout,
        continue_on_failure: cfg.build.continue_on_failure,
        warning_pattern,
    })
}

fn validate_module_names(cfg: &RawConfigFile) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for (name, _) in &cfg.module {
        let id = ModuleId::new(name);
        if id.is_root() {
            return Err(ConfigError::Invalid(format!(
                "invalid module name '{name}': the root project cannot be declared as a module"
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(ConfigError::DuplicateModule(id));
        }
    }
    Ok(())
}

fn validate_module_dependencies(cfg: &RawConfigFile) -> ConfigResult<()> {
    let declared: HashSet<ModuleId> = cfg.module.iter().map(|(n, _)| ModuleId::new(n)).collect();

    for (name, module) in &cfg.module {
        for dep in &module.depends_on {
            if !declared.contains(&ModuleId::new(dep)) {
                return Err(ConfigError::UnknownModule {
                    module: dep.clone(),
                    from: format!("module '{name}'"),
                });
            }
        }
    }
    Ok(())
}

fn task_spec(module: &ModuleId, name: &str, cfg: &TaskConfig) -> ConfigResult<TaskSpec> {
    let name = name.trim();
    if name.is_empty() || name.contains(':') {
        return Err(ConfigError::Invalid(format!(
            "invalid task name '{name}' in module '{module}'"
        )));
    }

    let refs = |list: &[String], field: &str| -> ConfigResult<Vec<TaskRef>> {
        list.iter()
            .map(|r| {
                if r.trim().is_empty() {
                    Err(ConfigError::Invalid(format!(
                        "empty task reference in `{field}` of task '{}'",
                        module.task(name)
                    )))
                } else {
                    Ok(TaskRef::parse(r))
                }
            })
            .collect()
    };

    let timeout = cfg
        .timeout
        .as_deref()
        .map(|s| parse_duration(s, &format!("timeout of task '{}'", module.task(name))))
        .transpose()?;

    Ok(TaskSpec {
        name: name.to_string(),
        cmd: cfg.cmd.clone(),
        depends_on: refs(&cfg.depends_on, "depends_on")?,
        finalized_by: refs(&cfg.finalized_by, "finalized_by")?,
        timeout,
        report: cfg.report.clone(),
        warnings_as_errors: cfg.warnings_as_errors,
        enabled: cfg.enabled,
        description: cfg.description.clone(),
        group: cfg.group.clone(),
    })
}

fn parse_duration(s: &str, what: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(s.trim())
        .map_err(|e| ConfigError::Invalid(format!("{what}: invalid duration '{s}': {e}")))
}
