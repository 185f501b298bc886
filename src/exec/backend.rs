// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning processes
//! itself, so tests can swap in a fake executor that emits `TaskCompleted`
//! events directly.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::policy::WarningPolicy;
use crate::exec::task_runner::run_task;
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::ReportAggregator;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Start the given tasks. Must not wait for them to finish: each task
    /// reports back with a `RuntimeEvent::TaskCompleted` when done.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Everything a running task needs besides its own description.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Working directory for commands; report paths are relative to it.
    pub project_dir: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub aggregator: Arc<ReportAggregator>,
    pub warnings: WarningPolicy,
    pub cancel: CancellationToken,
}

impl ExecContext {
    pub fn new(project_dir: impl Into<PathBuf>, aggregator: Arc<ReportAggregator>) -> Self {
        Self {
            project_dir: project_dir.into(),
            fs: Arc::new(RealFileSystem),
            aggregator,
            warnings: WarningPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_warnings(mut self, warnings: WarningPolicy) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Real executor backend: one Tokio task per scheduled task, each running a
/// shell command. The scheduler bounds how many are in flight.
#[derive(Debug)]
pub struct RealExecutorBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    ctx: Arc<ExecContext>,
}

impl RealExecutorBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, ctx: ExecContext) -> Self {
        Self {
            runtime_tx,
            ctx: Arc::new(ctx),
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        for task in tasks {
            tokio::spawn(run_task(task, Arc::clone(&self.ctx), self.runtime_tx.clone()));
        }
        Box::pin(async { Ok(()) })
    }
}
