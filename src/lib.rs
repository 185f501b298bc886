// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod registry;
pub mod report;
pub mod summary;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::{BuildArgs, CliArgs, Command};
use crate::config::{Project, load_and_validate, project_dir};
use crate::dag::{ExecutionPlan, Scheduler, SchedulerOptions, default_workers};
use crate::engine::{ConsoleListener, CoreRuntime, Runtime, RuntimeEvent};
use crate::errors::{BuildError, Result};
use crate::exec::{ExecContext, RealExecutorBackend, WarningPolicy};
use crate::fs::{FileSystem, RealFileSystem};
use crate::report::ReportAggregator;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading, plugins and linking
/// - target selection and planning
/// - scheduler / runtime / executor
/// - Ctrl-C handling
/// - report aggregation and output
pub async fn run(args: CliArgs) -> Result<i32> {
    match &args.command {
        Command::Tasks => {
            let project = load_project(&args.config)?;
            print_tasks(&project);
            Ok(0)
        }
        Command::Build(build) => run_build(&args.config, build).await,
    }
}

/// Load, validate and link the project described by `config_path`.
pub fn load_project(config_path: &Path) -> Result<Project> {
    let config = load_and_validate(config_path)?;
    Ok(Project::from_config(config)?)
}

async fn run_build(config_path: &Path, args: &BuildArgs) -> Result<i32> {
    let project = load_project(config_path)?;

    let (targets, named) = if args.all {
        (project.tasks.all_ids(), Vec::new())
    } else {
        (
            project.tasks.select(&args.selectors)?,
            project.tasks.named(&args.selectors)?,
        )
    };
    let plan = ExecutionPlan::build(&project.tasks, &targets)?.with_named(&named);

    if args.dry_run {
        print_plan(&plan);
        return Ok(0);
    }

    let options = SchedulerOptions {
        max_parallel: args
            .workers
            .and_then(|w| usize::try_from(w).ok())
            .or(project.settings.workers)
            .unwrap_or_else(default_workers),
        continue_on_failure: args.continue_on_failure || project.settings.continue_on_failure,
        default_timeout: args.timeout.or(project.settings.default_timeout),
    };
    info!(
        targets = targets.len(),
        planned = plan.len(),
        workers = options.max_parallel,
        continue_on_failure = options.continue_on_failure,
        "build configured"
    );

    let scheduler = Scheduler::new(Arc::clone(&project.tasks), &plan, options);
    let aggregator = Arc::new(ReportAggregator::new());
    let cancel = CancellationToken::new();

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = ExecContext::new(project_dir(config_path), Arc::clone(&aggregator))
        .with_warnings(WarningPolicy::new(project.settings.warning_pattern.clone()))
        .with_cancellation(cancel.clone());
    let executor = RealExecutorBackend::new(rt_tx.clone(), ctx);

    let runtime = Runtime::new(CoreRuntime::new(scheduler), rt_rx, executor)
        .with_cancellation(cancel)
        .with_listener(Arc::new(ConsoleListener));

    // Ctrl-C → abort.
    {
        let handle = runtime.handle(rt_tx);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; aborting build");
            handle.abort();
        });
    }

    let summary = runtime.run().await?;
    println!();
    println!("{summary}");

    write_coverage(&aggregator, args)?;

    Ok(summary.exit_code())
}

fn write_coverage(aggregator: &ReportAggregator, args: &BuildArgs) -> Result<()> {
    let report = match aggregator.merge() {
        Ok(report) => report,
        Err(err) if args.require_report => {
            error!(error = %err, "coverage report required but unavailable");
            return Err(err.into());
        }
        Err(err) => {
            warn!(error = %err, "no coverage report");
            return Ok(());
        }
    };

    let rendered = report::render(&report, args.report_format)?;
    match &args.report {
        Some(path) => {
            RealFileSystem
                .write(path, rendered.as_bytes())
                .map_err(BuildError::Other)?;
            info!(path = ?path, format = ?args.report_format, "coverage report written");
        }
        None if !report.is_empty() => {
            println!();
            print!("{rendered}");
        }
        None => debug!("coverage report is empty; nothing to print"),
    }
    Ok(())
}

/// Dry-run output: the plan grouped into levels that may run in parallel.
fn print_plan(plan: &ExecutionPlan) {
    let targets: Vec<String> = plan.targets().iter().map(ToString::to_string).collect();
    println!("buildgraph dry-run");
    println!("  targets: {}", targets.join(", "));
    println!("  tasks: {}", plan.len());
    println!();

    for (i, level) in plan.levels().iter().enumerate() {
        let ids: Vec<String> = level.iter().map(ToString::to_string).collect();
        println!("level {}: {}", i + 1, ids.join(" "));
    }

    debug!("dry-run complete (no execution)");
}

fn print_tasks(project: &Project) {
    let graph = &project.tasks;
    for module in graph.modules().modules() {
        let tasks: Vec<_> = graph.tasks_of(&module.id).collect();
        if module.id.is_root() && tasks.is_empty() {
            continue;
        }

        match &module.description {
            Some(desc) => println!("{} - {desc}", module.id),
            None => println!("{}", module.id),
        }
        for task in tasks {
            let mut line = format!("  {}", task.id);
            if let Some(group) = &task.group {
                line.push_str(&format!(" [{group}]"));
            }
            if !task.enabled {
                line.push_str(" (disabled)");
            }
            if let Some(desc) = &task.description {
                line.push_str(&format!(" - {desc}"));
            }
            println!("{line}");
        }
    }
}
