// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep, TaskStatus};
use crate::engine::{BuildEvent, TaskOutcome};
use crate::types::TaskId;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Fire the cancellation token observed by running tasks.
    CancelRunning,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Notifications for build listeners.
    pub events: Vec<BuildEvent>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Dispatch the initially eligible tasks.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.start();
    let mut core = CoreStep::default();
    append_step(&mut core, step, None);
    core
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskId,
    outcome: TaskOutcome,
) -> CoreStep {
    let was_running = scheduler.status_of(&task) == Some(&TaskStatus::Running);
    let step = scheduler.step_completion(&task, outcome);

    let mut core = CoreStep::default();
    if was_running {
        if let Some(status) = scheduler.status_of(&task) {
            core.events.push(BuildEvent::TaskFinished {
                task: task.clone(),
                status: status.clone(),
            });
        }
    }
    append_step(&mut core, step, Some(&task));
    core
}

/// Handle an abort request: cancel pending tasks and signal running ones.
pub fn handle_abort(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.abort();
    let mut core = CoreStep::default();
    core.commands.push(CoreCommand::CancelRunning);
    append_step(&mut core, step, None);
    core
}

fn append_step(core: &mut CoreStep, step: SchedulerStep, trigger: Option<&TaskId>) {
    if let Some(trigger) = trigger {
        core.events
            .extend(step.newly_added.iter().map(|task| BuildEvent::TaskAdded {
                task: task.clone(),
                trigger: trigger.clone(),
            }));
    }
    core.events.extend(
        step.newly_skipped
            .into_iter()
            .map(|(task, reason)| BuildEvent::TaskSkipped { task, reason }),
    );
    core.events.extend(
        step.newly_scheduled
            .iter()
            .map(|t| BuildEvent::TaskStarted(t.id.clone())),
    );

    if !step.newly_scheduled.is_empty() {
        core.commands
            .push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    core.keep_running = !step.build_finished;
}
