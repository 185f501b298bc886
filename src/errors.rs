// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ConfigError`]: invalid build configuration. Always fatal and raised
//!   before anything is scheduled.
//! - [`TaskError`]: why a single task failed. Recorded in the status table and
//!   handled by the scheduler's downstream-skip cascade.
//! - [`AggregationError`]: report merging problems, normally only a warning.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ModuleId, TaskId};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cyclic module dependency: {cycle}")]
    CyclicDependency { cycle: String },

    #[error("cyclic task dependency: {cycle}")]
    CyclicTaskDependency { cycle: String },

    #[error("unknown module '{module}' (referenced from {from})")]
    UnknownModule { module: String, from: String },

    #[error("unknown task '{reference}' (referenced from {from})")]
    UnknownTask { reference: String, from: String },

    #[error(
        "task '{task}' cannot depend on '{dependency}': module '{}' is not upstream of '{}'",
        .dependency.module,
        .task.module
    )]
    IllegalTaskDependency { task: TaskId, dependency: TaskId },

    #[error("task '{0}' is already registered")]
    DuplicateTask(TaskId),

    #[error("module '{0}' is already registered")]
    DuplicateModule(ModuleId),

    #[error("unknown plugin '{plugin}' applied to module '{module}'")]
    UnknownPlugin { plugin: String, module: ModuleId },

    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("invalid task pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Reason a task ended `Failed`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("process exited with status {0}")]
    ExitStatus(i32),

    #[error("timed out after {:?}", .0)]
    Timeout(Duration),

    #[error("warning treated as error (pattern `{pattern}`): {line}")]
    PolicyViolation { pattern: String, line: String },

    #[error("cancelled while running")]
    Cancelled,

    #[error("failed to start: {0}")]
    Spawn(String),

    #[error("invalid report fragment: {0}")]
    Report(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no report fragments were produced and no task completed successfully")]
    NoFragments,
}

/// Top-level error returned by [`crate::run`].
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Process exit code for this error: 2 for configuration problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Config(_) => 2,
            _ => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
