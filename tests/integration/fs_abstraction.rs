// tests/integration/fs_abstraction.rs

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use buildgraph::dag::ScheduledTask;
use buildgraph::engine::{RuntimeEvent, TaskOutcome};
use buildgraph::errors::TaskError;
use buildgraph::exec::ExecContext;
use buildgraph::exec::task_runner::run_task;
use buildgraph::fs::MockFileSystem;
use buildgraph::registry::TaskAction;
use buildgraph::report::{Metric, ReportAggregator};
use buildgraph_test_utils::builders::tid;

fn report_task(id: &str, report: &str) -> ScheduledTask {
    ScheduledTask {
        id: tid(id),
        action: TaskAction::Lifecycle,
        timeout: None,
        report: Some(PathBuf::from(report)),
        warnings_as_errors: false,
    }
}

async fn completion(rx: &mut mpsc::Receiver<RuntimeEvent>) -> (String, TaskOutcome) {
    match rx.recv().await {
        Some(RuntimeEvent::TaskCompleted { task, outcome }) => (task.to_string(), outcome),
        other => panic!("expected TaskCompleted, got {:?}", other),
    }
}

#[tokio::test]
async fn report_fragment_is_read_relative_to_the_project() {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/project/core/build/coverage.json",
        r#"[{"metric":"line","source":"core/A.java","start":1,"end":9,"covered":6,"missed":3}]"#,
    );
    let aggregator = Arc::new(ReportAggregator::new());
    let ctx = ExecContext::new("/project", Arc::clone(&aggregator)).with_fs(Arc::new(fs));

    let (tx, mut rx) = mpsc::channel(4);
    run_task(report_task("core:test", "core/build/coverage.json"), Arc::new(ctx), tx).await;

    assert_eq!(
        completion(&mut rx).await,
        (":core:test".to_string(), TaskOutcome::Success)
    );
    let report = aggregator.merge().unwrap();
    assert_eq!(report.totals[&Metric::Line].covered, 6);
    assert_eq!(aggregator.success_count(), 1);
}

#[tokio::test]
async fn missing_fragment_fails_the_task() {
    let aggregator = Arc::new(ReportAggregator::new());
    let ctx = ExecContext::new("/project", Arc::clone(&aggregator))
        .with_fs(Arc::new(MockFileSystem::new()));

    let (tx, mut rx) = mpsc::channel(4);
    run_task(report_task("api:test", "api/coverage.json"), Arc::new(ctx), tx).await;

    let (task, outcome) = completion(&mut rx).await;
    assert_eq!(task, ":api:test");
    assert!(matches!(outcome, TaskOutcome::Failed(TaskError::Report(_))));
    assert_eq!(aggregator.fragment_count(), 0);
    assert_eq!(aggregator.success_count(), 0);
}
