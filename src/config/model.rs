// src/config/model.rs

use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::registry::TaskRef;
use crate::types::ModuleId;

/// Pattern used by `warnings_as_errors` tasks when `[build].warning_pattern`
/// is not set. Matches javac/kotlinc style `Foo.java:12: warning: ...` lines.
pub const DEFAULT_WARNING_PATTERN: &str = r"(?i)\bwarning:";

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [build]
/// workers = 4
/// default_timeout = "10m"
///
/// [subprojects]
/// plugins = ["java", "jacoco"]
///
/// [module.core]
///
/// [module.api]
/// depends_on = ["core"]
///
/// [module.api.task.test]
/// cmd = "./run-tests.sh api"
///
/// [task.testAll]
/// depends_on = [":*:test"]
/// ```
///
/// Modules and tasks keep their declaration order; it is the tie-breaker
/// whenever the graph leaves the execution order open.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub subprojects: SubprojectsSection,

    /// `[module.<name>]` sections in declaration order.
    #[serde(default, deserialize_with = "ordered_tables")]
    pub module: Vec<(String, ModuleConfig)>,

    /// `[task.<name>]` sections: tasks of the root project.
    #[serde(default, deserialize_with = "ordered_tables")]
    pub task: Vec<(String, TaskConfig)>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Worker-pool size. The CLI flag wins when both are given.
    #[serde(default)]
    pub workers: Option<usize>,

    /// Duration string (e.g. `"10m"`) applied to tasks without their own timeout.
    #[serde(default)]
    pub default_timeout: Option<String>,

    #[serde(default)]
    pub continue_on_failure: bool,

    /// Regex checked against the output of `warnings_as_errors` tasks.
    #[serde(default)]
    pub warning_pattern: Option<String>,
}

/// `[subprojects]` section: settings applied to every module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubprojectsSection {
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Names of modules this module depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Plugins applied after the `[subprojects]` ones.
    #[serde(default)]
    pub plugins: Vec<String>,

    /// `[module.<name>.task.<task>]` sections.
    #[serde(default, deserialize_with = "ordered_tables")]
    pub task: Vec<(String, TaskConfig)>,
}

/// `[module.<name>.task.<task>]` or `[task.<task>]` section.
///
/// Every field is optional: a section naming a task a plugin already
/// registered only overrides what it sets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Shell command. Tasks without one are lifecycle tasks.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub finalized_by: Vec<String>,

    #[serde(default)]
    pub timeout: Option<String>,

    /// Report fragment written by the task, relative to the project directory.
    #[serde(default)]
    pub report: Option<PathBuf>,

    #[serde(default)]
    pub warnings_as_errors: Option<bool>,

    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub group: Option<String>,
}

/// Validated configuration.
///
/// Constructed from [`RawConfigFile`] via `TryFrom` in `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub build: BuildSettings,
    /// Plugins applied to every module, in order.
    pub subprojects: Vec<String>,
    pub modules: Vec<ModuleSpec>,
    /// Tasks of the root project `:`.
    pub root_tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub workers: Option<usize>,
    pub default_timeout: Option<Duration>,
    pub continue_on_failure: bool,
    pub warning_pattern: Regex,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            workers: None,
            default_timeout: None,
            continue_on_failure: false,
            warning_pattern: Regex::new(DEFAULT_WARNING_PATTERN)
                .expect("default warning pattern is valid"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub id: ModuleId,
    pub depends_on: Vec<ModuleId>,
    pub description: Option<String>,
    pub plugins: Vec<String>,
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub cmd: Option<String>,
    pub depends_on: Vec<TaskRef>,
    pub finalized_by: Vec<TaskRef>,
    pub timeout: Option<Duration>,
    pub report: Option<PathBuf>,
    pub warnings_as_errors: Option<bool>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub group: Option<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        build: BuildSettings,
        subprojects: Vec<String>,
        modules: Vec<ModuleSpec>,
        root_tasks: Vec<TaskSpec>,
    ) -> Self {
        Self {
            build,
            subprojects,
            modules,
            root_tasks,
        }
    }
}

/// Deserialize a TOML table into `(key, value)` pairs, keeping document order.
fn ordered_tables<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct OrderedVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a table of named sections")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, T>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}
