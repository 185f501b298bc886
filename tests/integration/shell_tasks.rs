// tests/integration/shell_tasks.rs

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use buildgraph::cli::CliArgs;
use buildgraph::dag::ScheduledTask;
use buildgraph::engine::TaskOutcome;
use buildgraph::errors::{AggregationError, BuildError, TaskError};
use buildgraph::exec::ExecContext;
use buildgraph::exec::task_runner::execute;
use buildgraph::registry::TaskAction;
use buildgraph::report::ReportAggregator;
use buildgraph_test_utils::builders::tid;
use buildgraph_test_utils::{init_tracing, with_timeout};

fn shell_task(cmd: &str) -> ScheduledTask {
    ScheduledTask {
        id: tid("core:test"),
        action: TaskAction::Command(cmd.to_string()),
        timeout: None,
        report: None,
        warnings_as_errors: false,
    }
}

fn context(dir: &Path) -> ExecContext {
    ExecContext::new(dir, Arc::new(ReportAggregator::new()))
}

fn project(toml_str: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("buildgraph.toml"), toml_str).unwrap();
    dir
}

async fn build(dir: &TempDir, extra: &[&str]) -> Result<i32, BuildError> {
    let config = dir.path().join("buildgraph.toml");
    let config = config.to_string_lossy().into_owned();
    let mut argv = vec!["buildgraph", "--config", config.as_str(), "build"];
    argv.extend_from_slice(extra);
    buildgraph::run(CliArgs::try_parse_from(argv).unwrap()).await
}

#[tokio::test]
async fn non_zero_exit_fails_the_task() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let outcome = execute(&shell_task("exit 3"), &context(dir.path()))
        .await
        .unwrap();
    assert_eq!(outcome, TaskOutcome::Failed(TaskError::ExitStatus(3)));
}

#[tokio::test]
async fn deadline_kills_the_process() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let task = ScheduledTask {
        timeout: Some(Duration::from_millis(100)),
        ..shell_task("sleep 5")
    };

    let outcome = execute(&task, &context(dir.path())).await.unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Failed(TaskError::Timeout(Duration::from_millis(100)))
    );
}

#[tokio::test]
async fn cancellation_kills_the_process() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let ctx = context(dir.path()).with_cancellation(cancel.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let outcome = with_timeout(execute(&shell_task("sleep 30"), &ctx))
        .await
        .unwrap();
    assert_eq!(outcome, TaskOutcome::Failed(TaskError::Cancelled));
}

#[tokio::test]
async fn non_utf8_output_is_read_to_the_end() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    // Latin-1 output followed by more than a pipe buffer of lines.
    let cmd = r"printf 'caf\351\n'; i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done";
    let task = ScheduledTask {
        timeout: Some(Duration::from_secs(20)),
        ..shell_task(cmd)
    };

    let outcome = execute(&task, &context(dir.path())).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Success);

    let strict = ScheduledTask {
        warnings_as_errors: true,
        ..shell_task(r"printf 'caf\351\n'; echo 'Foo.java:7: warning: [rawtypes] raw type'")
    };
    let outcome = execute(&strict, &context(dir.path())).await.unwrap();
    assert!(
        matches!(
            outcome,
            TaskOutcome::Failed(TaskError::PolicyViolation { ref line, .. }) if line.contains("Foo.java:7")
        ),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn compiler_warning_fails_a_strict_task() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cmd = "echo 'Foo.java:3: warning: [unchecked] unchecked call'";
    let strict = ScheduledTask {
        warnings_as_errors: true,
        ..shell_task(cmd)
    };

    let outcome = execute(&strict, &context(dir.path())).await.unwrap();
    assert!(
        matches!(
            outcome,
            TaskOutcome::Failed(TaskError::PolicyViolation { ref line, .. }) if line.contains("Foo.java:3")
        ),
        "{outcome:?}"
    );

    let lenient = execute(&shell_task(cmd), &context(dir.path())).await.unwrap();
    assert_eq!(lenient, TaskOutcome::Success);
}

#[tokio::test]
async fn commands_run_in_module_order_inside_the_project_dir() {
    init_tracing();
    let dir = project(
        r#"
[module.core.task.test]
cmd = "echo core >> order.txt"

[module.api]
depends_on = ["core"]

[module.api.task.test]
cmd = "echo api >> order.txt"
depends_on = [":core:test"]

[module.web]
depends_on = ["api"]

[module.web.task.test]
cmd = "echo web >> order.txt"
depends_on = [":api:test"]
finalized_by = ["report"]

[module.web.task.report]
cmd = "echo report >> order.txt"
"#,
    );

    let code = build(&dir, &["web:test", "--workers", "4"]).await.unwrap();
    assert_eq!(code, 0);

    let order = fs::read_to_string(dir.path().join("order.txt")).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), ["core", "api", "web", "report"]);
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let dir = project(
        r#"
[module.core.task.test]
cmd = "touch core-ran"
"#,
    );

    let code = build(&dir, &["--all", "--dry-run"]).await.unwrap();
    assert_eq!(code, 0);
    assert!(!dir.path().join("core-ran").exists());
}

#[tokio::test]
async fn failing_command_exits_with_one_and_skips_dependents() {
    init_tracing();
    let dir = project(
        r#"
[module.core.task.test]
cmd = "exit 1"

[module.api]
depends_on = ["core"]

[module.api.task.test]
cmd = "touch api-ran"
depends_on = [":core:test"]
"#,
    );

    let code = build(&dir, &["--all"]).await.unwrap();
    assert_eq!(code, 1);
    assert!(!dir.path().join("api-ran").exists());
}

#[tokio::test]
async fn fragments_are_merged_into_the_report_file() {
    init_tracing();
    let dir = project(
        r#"
[module.core.task.test]
cmd = "mkdir -p build && echo '[{\"metric\":\"line\",\"source\":\"A.java\",\"start\":1,\"end\":4,\"covered\":3,\"missed\":1}]' > build/coverage.json"
report = "build/coverage.json"
"#,
    );
    let out = dir.path().join("out/coverage.csv");
    let out_arg = out.to_string_lossy().into_owned();

    let code = build(&dir, &["core:test", "--report", out_arg.as_str()])
        .await
        .unwrap();
    assert_eq!(code, 0);

    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.contains(":core,line,3,1,0.7500"), "{csv}");
    assert!(csv.contains("ALL,line,3,1,0.7500"), "{csv}");
}

#[tokio::test]
async fn required_report_without_any_success_fails() {
    init_tracing();
    let dir = project(
        r#"
[module.core.task.test]
cmd = "exit 1"
"#,
    );

    let err = build(&dir, &["--all", "--require-report"]).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Aggregation(AggregationError::NoFragments)
    ));
    assert_eq!(err.exit_code(), 1);
}
