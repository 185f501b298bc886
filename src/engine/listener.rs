// src/engine/listener.rs

use std::io::Write;

use crate::dag::TaskStatus;
use crate::engine::BuildEvent;

/// Observer of build progress. Called from the runtime loop, in order.
pub trait BuildListener: Send + Sync {
    fn on_event(&self, event: &BuildEvent);
}

/// Prints one Gradle-style line per task to stdout:
///
/// ```text
/// > Task :core:test
/// > Task :api:test SKIPPED
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsoleListener;

impl BuildListener for ConsoleListener {
    fn on_event(&self, event: &BuildEvent) {
        let line = match event {
            BuildEvent::TaskStarted(task) => format!("> Task {task}"),
            BuildEvent::TaskFinished {
                task,
                status: TaskStatus::Failed(err),
            } => format!("> Task {task} FAILED: {err}"),
            BuildEvent::TaskSkipped { task, .. } => format!("> Task {task} SKIPPED"),
            _ => return,
        };

        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}
