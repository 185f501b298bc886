// src/engine/mod.rs

//! Orchestration engine.
//!
//! Ties the scheduler to the executor: the runtime loop reacts to task
//! completions and abort requests, dispatches newly eligible tasks and
//! reports progress to [`BuildListener`]s.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::dag::{SkipReason, TaskStatus};
use crate::errors::TaskError;
use crate::summary::BuildResult;
use crate::types::TaskId;

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(TaskError),
}

/// Events flowing into the runtime from executors and build handles.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched task finished.
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    /// Cancel the build (e.g. Ctrl-C or [`BuildHandle::abort`]).
    AbortRequested,
}

/// Progress notifications delivered to listeners, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    TaskStarted(TaskId),
    /// A task that ran reached `Succeeded` or `Failed`.
    TaskFinished { task: TaskId, status: TaskStatus },
    TaskSkipped { task: TaskId, reason: SkipReason },
    /// A finalizer (or one of its dependencies) joined the build.
    TaskAdded { task: TaskId, trigger: TaskId },
    BuildFinished(BuildResult),
}

pub mod core;
pub mod event_handlers;
pub mod listener;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use listener::{BuildListener, ConsoleListener};
pub use runtime::{BuildHandle, Runtime};
