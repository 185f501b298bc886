// src/engine/runtime.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, TaskStatus};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::summary::BuildSummary;
use crate::types::TaskId;

use super::core::CoreRuntime;
use super::listener::BuildListener;
use super::{BuildEvent, CoreCommand, RuntimeEvent};

/// Drives the scheduler in response to `RuntimeEvent`s and delegates command
/// execution to an `ExecutorBackend`.
///
/// This is an IO shell around `CoreRuntime`, which holds all the build
/// semantics. The core sits behind a mutex shared with [`BuildHandle`]s; the
/// lock is never held across an `.await`.
pub struct Runtime<E: ExecutorBackend> {
    core: Arc<Mutex<CoreRuntime>>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    listeners: Vec<Arc<dyn BuildListener>>,
    cancel: CancellationToken,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core: Arc::new(Mutex::new(core)),
            event_rx,
            executor,
            listeners: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` as the cancellation signal for running tasks. The executor
    /// backend must observe the same token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn BuildListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Handle for status snapshots and aborting. `tx` must feed this runtime.
    pub fn handle(&self, tx: mpsc::Sender<RuntimeEvent>) -> BuildHandle {
        BuildHandle {
            core: Arc::clone(&self.core),
            tx,
            cancel: self.cancel.clone(),
        }
    }

    /// Main event loop.
    ///
    /// - Dispatches the initially eligible tasks.
    /// - Consumes `RuntimeEvent`s from `event_rx` and feeds them to the core.
    /// - Executes the returned commands until every task is terminal.
    pub async fn run(mut self) -> Result<BuildSummary> {
        info!("build runtime started");

        let step = lock(&self.core).start();
        let mut keep_running = step.keep_running;
        self.notify(&step.events);
        for command in step.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!("runtime event channel closed before the build finished").into());
                }
            };

            debug!(?event, "runtime received event");

            let step = lock(&self.core).step(event);
            keep_running = step.keep_running;
            self.notify(&step.events);
            for command in step.commands {
                self.execute_command(command).await?;
            }
        }

        let summary = lock(&self.core).summary();
        self.notify(&[BuildEvent::BuildFinished(summary.result())]);
        info!(result = %summary.result(), "runtime exiting");
        Ok(summary)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
            CoreCommand::CancelRunning => {
                info!("cancelling running tasks");
                self.cancel.cancel();
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = tasks.iter().map(|t| t.id.to_string()).collect();
        debug!(?ids, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }

    fn notify(&self, events: &[BuildEvent]) {
        for event in events {
            for listener in &self.listeners {
                listener.on_event(event);
            }
        }
    }
}

/// Shared view of a running build.
#[derive(Debug, Clone)]
pub struct BuildHandle {
    core: Arc<Mutex<CoreRuntime>>,
    tx: mpsc::Sender<RuntimeEvent>,
    cancel: CancellationToken,
}

impl BuildHandle {
    /// Cancel the build: running tasks are signalled immediately, pending
    /// ones are skipped once the runtime processes the request.
    pub fn abort(&self) {
        self.cancel.cancel();
        if let Err(e) = self.tx.try_send(RuntimeEvent::AbortRequested) {
            warn!(error = %e, "failed to deliver abort request to runtime");
        }
    }

    pub fn statuses(&self) -> Vec<(TaskId, TaskStatus)> {
        lock(&self.core).statuses()
    }

    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        lock(&self.core).scheduler().status_of(id).cloned()
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.core).is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn lock(core: &Mutex<CoreRuntime>) -> MutexGuard<'_, CoreRuntime> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}
