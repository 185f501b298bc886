// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! Consumes [`RuntimeEvent`]s and produces a [`CoreStep`]: commands for the
//! IO shell plus listener notifications. It has no channels, no Tokio types
//! and performs no IO, so it can be stepped by hand in tests.

use crate::dag::{Scheduler, TaskStatus};
use crate::engine::RuntimeEvent;
use crate::engine::event_handlers::{CoreStep, handle_abort, handle_start, handle_task_completion};
use crate::summary::BuildSummary;
use crate::types::TaskId;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    pub fn statuses(&self) -> Vec<(TaskId, TaskStatus)> {
        self.scheduler.statuses()
    }

    pub fn summary(&self) -> BuildSummary {
        self.scheduler.summary()
    }

    /// Dispatch the initially eligible tasks.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.scheduler, task, outcome)
            }
            RuntimeEvent::AbortRequested => handle_abort(&mut self.scheduler),
        }
    }
}
