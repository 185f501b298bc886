// src/exec/task_runner.rs

//! Individual task process runner.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::TaskError;
use crate::exec::backend::ExecContext;
use crate::exec::policy::WarningPolicy;
use crate::registry::TaskAction;
use crate::report::ReportFragment;

/// Run a single task and emit its `TaskCompleted` event.
///
/// On success the task's report fragment, if it declares one, is loaded and
/// handed to the aggregator before the completion is reported.
pub async fn run_task(task: ScheduledTask, ctx: Arc<ExecContext>, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let outcome = match execute(&task, &ctx).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(task = %task.id, error = %format!("{err:#}"), "task execution error");
            TaskOutcome::Failed(TaskError::Spawn(format!("{err:#}")))
        }
    };

    let outcome = match outcome {
        TaskOutcome::Success => collect_report(&task, &ctx),
        failed => failed,
    };

    if let Err(e) = runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.id.clone(),
            outcome,
        })
        .await
    {
        warn!(task = %task.id, error = %e, "runtime gone; dropping task completion");
    }
}

/// Run the task's action to completion, timeout or cancellation.
pub async fn execute(task: &ScheduledTask, ctx: &ExecContext) -> Result<TaskOutcome> {
    if ctx.cancel.is_cancelled() {
        return Ok(TaskOutcome::Failed(TaskError::Cancelled));
    }

    let cmd_line = match &task.action {
        TaskAction::Lifecycle => {
            debug!(task = %task.id, "lifecycle task; nothing to run");
            return Ok(TaskOutcome::Success);
        }
        TaskAction::Command(cmd) => cmd,
    };

    info!(task = %task.id, cmd = %cmd_line, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd_line);
        c
    };

    cmd.current_dir(&ctx.project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.id))?;

    let policy = task.warnings_as_errors.then(|| ctx.warnings.clone());
    let stdout = child
        .stdout
        .take()
        .map(|out| forward_lines(task, "stdout", out, policy.clone()));
    let stderr = child
        .stderr
        .take()
        .map(|err| forward_lines(task, "stderr", err, policy.clone()));

    let deadline = async {
        match task.timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let status = tokio::select! {
        status = child.wait() => {
            status.with_context(|| format!("waiting for process of task '{}'", task.id))?
        }
        _ = deadline => {
            let limit = task.timeout.unwrap_or(Duration::ZERO);
            warn!(task = %task.id, timeout = ?limit, "task timed out; killing process");
            kill(task, &mut child).await;
            return Ok(TaskOutcome::Failed(TaskError::Timeout(limit)));
        }
        _ = ctx.cancel.cancelled() => {
            info!(task = %task.id, "cancellation requested; killing process");
            kill(task, &mut child).await;
            return Ok(TaskOutcome::Failed(TaskError::Cancelled));
        }
    };

    let code = status.code().unwrap_or(-1);
    info!(
        task = %task.id,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if !status.success() {
        return Ok(TaskOutcome::Failed(TaskError::ExitStatus(code)));
    }

    if policy.is_some() {
        for reader in [stdout, stderr].into_iter().flatten() {
            if let Ok(Some(violation)) = reader.await {
                warn!(task = %task.id, error = %violation, "warning treated as error");
                return Ok(TaskOutcome::Failed(violation));
            }
        }
    }

    Ok(TaskOutcome::Success)
}

/// Log every line of `stream`; with a policy, yield the first violation.
///
/// Lines are decoded lossily so non-UTF-8 output never stops the reader
/// before EOF; a closed pipe would kill the child with `SIGPIPE`.
fn forward_lines<R>(
    task: &ScheduledTask,
    stream: &'static str,
    reader: R,
    policy: Option<WarningPolicy>,
) -> JoinHandle<Option<TaskError>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let id = task.id.clone();
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut violation = None;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(task = %id, stream, error = %e, "failed to read task output");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);
            info!(task = %id, stream, "{}", line);
            if violation.is_none() {
                violation = policy.as_ref().and_then(|p| p.check(line));
            }
        }

        violation
    })
}

async fn kill(task: &ScheduledTask, child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        warn!(task = %task.id, error = %e, "failed to kill child process");
    }
}

fn collect_report(task: &ScheduledTask, ctx: &ExecContext) -> TaskOutcome {
    if let Some(path) = &task.report {
        let path = ctx.project_dir.join(path);
        match ReportFragment::load(ctx.fs.as_ref(), &path, &task.id) {
            Ok(fragment) => {
                debug!(
                    task = %task.id,
                    records = fragment.records.len(),
                    "collected report fragment"
                );
                ctx.aggregator.collect(fragment);
            }
            Err(err) => {
                warn!(task = %task.id, path = ?path, error = %format!("{err:#}"), "unreadable report fragment");
                return TaskOutcome::Failed(TaskError::Report(format!("{err:#}")));
            }
        }
    }

    ctx.aggregator.record_success();
    TaskOutcome::Success
}
