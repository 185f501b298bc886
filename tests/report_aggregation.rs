// tests/report_aggregation.rs

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;

use buildgraph::dag::{Scheduler, SchedulerOptions};
use buildgraph::engine::{CoreRuntime, Runtime, RuntimeEvent};
use buildgraph::errors::{AggregationError, TaskError};
use buildgraph::report::{
    Counter, CoverageRecord, Metric, ReportAggregator, ReportFragment, render,
};
use buildgraph::summary::BuildSummary;
use buildgraph::types::{ModuleId, ReportFormat};
use buildgraph_test_utils::builders::{tid, webapp};
use buildgraph_test_utils::fake_executor::FakeExecutor;
use buildgraph_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn fragment(task: &str, records: Vec<CoverageRecord>) -> ReportFragment {
    ReportFragment::new(tid(task), records)
}

async fn build_webapp(
    aggregator: Arc<ReportAggregator>,
    script: impl FnOnce(FakeExecutor) -> FakeExecutor,
) -> Result<BuildSummary, Box<dyn Error>> {
    let scheduler = Scheduler::for_targets(webapp(), &[tid("web:test")], SchedulerOptions::default())?;
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = script(FakeExecutor::new(rt_tx).with_aggregator(aggregator));
    let runtime = Runtime::new(CoreRuntime::new(scheduler), rt_rx, executor);
    Ok(with_timeout(runtime.run()).await?)
}

#[tokio::test]
async fn fragments_from_every_module_are_merged() -> TestResult {
    init_tracing();

    let aggregator = Arc::new(ReportAggregator::new());
    build_webapp(Arc::clone(&aggregator), |fake| {
        fake.fragment(fragment(
            "core:test",
            vec![
                CoverageRecord::new(Metric::Line, "core/Util.java", (1, 10), 8, 2),
                CoverageRecord::new(Metric::Branch, "core/Util.java", (3, 3), 1, 1),
            ],
        ))
        .fragment(fragment(
            "api:test",
            vec![CoverageRecord::new(Metric::Line, "api/Handler.java", (1, 4), 4, 0)],
        ))
        // The report task re-reads the range `core:test` already covered.
        .fragment(fragment(
            "web:report",
            vec![CoverageRecord::new(Metric::Line, "core/Util.java", (1, 10), 8, 2)],
        ))
    })
    .await?;

    let report = aggregator.merge()?;

    assert_eq!(report.fragments, 3);
    assert_eq!(
        report.totals[&Metric::Line],
        Counter {
            covered: 12,
            missed: 2
        }
    );
    assert_eq!(
        report.totals[&Metric::Branch],
        Counter {
            covered: 1,
            missed: 1
        }
    );
    assert_eq!(
        report.modules[&ModuleId::new("web")][&Metric::Line],
        Counter {
            covered: 8,
            missed: 2
        }
    );
    assert_eq!(report.sources.len(), 2);

    let csv = render(&report, ReportFormat::Csv)?;
    assert!(csv.lines().any(|l| l.starts_with(":api,line,4,0")));

    assert_eq!(aggregator.merge()?, report);
    Ok(())
}

#[tokio::test]
async fn failed_build_keeps_fragments_of_tasks_that_ran() -> TestResult {
    init_tracing();

    let aggregator = Arc::new(ReportAggregator::new());
    let summary = build_webapp(Arc::clone(&aggregator), |fake| {
        fake.fragment(fragment(
            "core:test",
            vec![CoverageRecord::new(Metric::Line, "core/Util.java", (1, 10), 5, 5)],
        ))
        .fail(tid("api:test"), TaskError::ExitStatus(1))
    })
    .await?;

    assert_eq!(summary.exit_code(), 1);
    let report = aggregator.merge()?;
    assert_eq!(report.fragments, 1);
    assert_eq!(report.modules.len(), 1);
    Ok(())
}

#[tokio::test]
async fn nothing_succeeded_means_no_report() -> TestResult {
    init_tracing();

    let aggregator = Arc::new(ReportAggregator::new());
    build_webapp(Arc::clone(&aggregator), |fake| {
        fake.fail(tid("core:test"), TaskError::ExitStatus(1))
    })
    .await?;

    assert_eq!(aggregator.merge(), Err(AggregationError::NoFragments));
    Ok(())
}
