// src/types.rs

//! Identifier and small enum types shared across the crate.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

/// Path of a module in the build, e.g. `:core` or `:services:auth`.
///
/// The canonical form always carries a leading colon. The root project is
/// `:`. User input may omit the leading colon (`core` is `:core`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(path: &str) -> Self {
        let trimmed = path.trim().trim_start_matches(':').trim_end_matches(':');
        if trimmed.is_empty() {
            Self::root()
        } else {
            ModuleId(format!(":{trimmed}"))
        }
    }

    /// The root project `:`.
    pub fn root() -> Self {
        ModuleId(":".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ":"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (`auth` for `:services:auth`, empty for the root).
    pub fn name(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or("")
    }

    /// Id of a task called `name` in this module.
    pub fn task(&self, name: &str) -> TaskId {
        TaskId::new(self.clone(), name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        ModuleId::new(s)
    }
}

/// Fully-qualified task id: owning module plus task name.
///
/// Displayed Gradle-style: `:core:test`, or `:testAll` for root tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub module: ModuleId,
    pub name: String,
}

impl TaskId {
    pub fn new(module: ModuleId, name: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
        }
    }

    /// Parse `web:test`, `:web:test` or `:testAll`.
    ///
    /// A bare name without any colon is not a task id.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (prefix, name) = s.rsplit_once(':')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(ModuleId::new(prefix), name))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_root() {
            write!(f, ":{}", self.name)
        } else {
            write!(f, "{}:{}", self.module, self.name)
        }
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Machine- or human-readable output format for the aggregated report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `module,metric,covered,missed,ratio` records, one per line.
    Csv,
    /// The full aggregated report as JSON.
    Json,
    /// Human-readable summary table.
    Text,
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat::Csv
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            other => Err(format!(
                "invalid report format: {other} (expected \"csv\", \"json\" or \"text\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_ids_are_normalised() {
        assert_eq!(ModuleId::new("core").as_str(), ":core");
        assert_eq!(ModuleId::new(":core").as_str(), ":core");
        assert_eq!(ModuleId::new("services:auth").name(), "auth");
        assert!(ModuleId::new("").is_root());
        assert!(ModuleId::new(":").is_root());
    }

    #[test]
    fn task_ids_parse_and_display() {
        let id = TaskId::parse("web:test").unwrap();
        assert_eq!(id.module, ModuleId::new(":web"));
        assert_eq!(id.to_string(), ":web:test");

        let root = TaskId::parse(":testAll").unwrap();
        assert!(root.module.is_root());
        assert_eq!(root.to_string(), ":testAll");

        assert!(TaskId::parse("test").is_none());
        assert!(TaskId::parse("web:").is_none());
    }
}
