// src/report/fragment.rs

//! Coverage report fragments as written by tasks.
//!
//! A fragment file is a JSON array of records:
//!
//! ```json
//! [
//!   { "metric": "line", "source": "core/src/Strings.java",
//!     "start": 10, "end": 14, "covered": 4, "missed": 1 }
//! ]
//! ```

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fs::FileSystem;
use crate::types::{ModuleId, TaskId};

/// Coverage counter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Instruction,
    Branch,
    Line,
    Complexity,
    Method,
    Class,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Instruction => "instruction",
            Metric::Branch => "branch",
            Metric::Line => "line",
            Metric::Complexity => "complexity",
            Metric::Method => "method",
            Metric::Class => "class",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One counter over a source range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub metric: Metric,
    /// Source file the range belongs to.
    pub source: String,
    pub start: u32,
    pub end: u32,
    pub covered: u64,
    pub missed: u64,
}

impl CoverageRecord {
    pub fn new(metric: Metric, source: impl Into<String>, range: (u32, u32), covered: u64, missed: u64) -> Self {
        Self {
            metric,
            source: source.into(),
            start: range.0,
            end: range.1,
            covered,
            missed,
        }
    }
}

/// Records produced by one task of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFragment {
    pub module: ModuleId,
    pub task: TaskId,
    pub records: Vec<CoverageRecord>,
}

impl ReportFragment {
    pub fn new(task: TaskId, records: Vec<CoverageRecord>) -> Self {
        Self {
            module: task.module.clone(),
            task,
            records,
        }
    }

    pub fn parse_json(task: TaskId, json: &str) -> serde_json::Result<Self> {
        let records: Vec<CoverageRecord> = serde_json::from_str(json)?;
        Ok(Self::new(task, records))
    }

    /// Read and parse the fragment `task` wrote at `path`.
    pub fn load(fs: &dyn FileSystem, path: &Path, task: &TaskId) -> Result<Self> {
        let json = fs.read_to_string(path)?;
        Self::parse_json(task.clone(), &json)
            .with_context(|| format!("parsing report fragment {:?}", path))
    }
}
