// tests/property/scheduler.rs

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use proptest::prelude::*;

use buildgraph::dag::{Scheduler, SchedulerOptions, TaskStatus};
use buildgraph::engine::TaskOutcome;
use buildgraph::errors::TaskError;
use buildgraph::registry::TaskGraph;
use buildgraph::types::TaskId;
use buildgraph_test_utils::builders::{GraphBuilder, task};

/// A random acyclic build.
///
/// Modules `m0 <- m1 <- ...` form a chain; task `i` lives in module
/// `i * modules / tasks` and may only depend on tasks `0..i`, so every
/// dependency points at the same or an upstream module.
#[derive(Debug, Clone)]
struct Build {
    graph: Arc<TaskGraph>,
    ids: Vec<TaskId>,
    disabled: HashSet<usize>,
}

fn build_strategy(max_tasks: usize) -> impl Strategy<Value = Build> {
    (1..=max_tasks, 1..=4usize).prop_flat_map(|(num_tasks, num_modules)| {
        let deps = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..3),
            num_tasks,
        );
        let disabled = proptest::collection::hash_set(0..num_tasks, 0..2);

        (deps, disabled).prop_map(move |(raw_deps, disabled)| {
            let mut builder = GraphBuilder::new();
            for m in 0..num_modules {
                let name = format!("m{m}");
                let upstream = if m == 0 { vec![] } else { vec![format!("m{}", m - 1)] };
                let upstream: Vec<&str> = upstream.iter().map(String::as_str).collect();
                builder = builder.module(&name, &upstream);
            }

            let module_of = |i: usize| i * num_modules / num_tasks;
            let ids: Vec<String> = (0..num_tasks)
                .map(|i| format!("m{}:t{i}", module_of(i)))
                .collect();

            for (i, potential) in raw_deps.into_iter().enumerate() {
                let mut def = task(&ids[i])
                    .command(format!("echo {i}"))
                    .enabled(!disabled.contains(&i));
                let valid: HashSet<usize> = potential
                    .into_iter()
                    .filter(|_| i > 0)
                    .map(|d| d % i)
                    .collect();
                for d in valid {
                    def = def.depends_on(format!(":{}", ids[d]).as_str());
                }
                builder = builder.task(def);
            }

            let graph = builder.build();
            let ids = ids
                .iter()
                .map(|s| buildgraph_test_utils::builders::tid(s))
                .collect();
            Build {
                graph,
                ids,
                disabled,
            }
        })
    })
}

/// Drive the scheduler to completion, completing tasks FIFO. Checks the
/// worker bound and dispatch order on every step.
fn simulate(
    build: &Build,
    workers: usize,
    failing: &HashSet<usize>,
) -> Result<Scheduler, TestCaseError> {
    let options = SchedulerOptions {
        max_parallel: workers,
        ..SchedulerOptions::default()
    };
    let mut scheduler = Scheduler::for_targets(Arc::clone(&build.graph), &build.ids, options)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    let position: HashMap<&TaskId, usize> =
        build.ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut running: VecDeque<TaskId> = VecDeque::new();
    let mut steps = 0;

    let check = |scheduler: &Scheduler, dispatched: Vec<TaskId>| -> Result<Vec<TaskId>, TestCaseError> {
        prop_assert!(scheduler.running_count() <= workers);
        for id in &dispatched {
            let info = scheduler
                .tasks()
                .iter()
                .find(|t| &t.id == id)
                .expect("dispatched task is in the table");
            for dep in &info.hard_deps {
                prop_assert!(
                    scheduler.status_of(dep).is_some_and(TaskStatus::satisfies_dependents),
                    "{} dispatched before {}",
                    id,
                    dep
                );
            }
            for other in scheduler.tasks() {
                if scheduler.graph().modules().is_upstream_of(&other.id.module, &id.module) {
                    prop_assert!(
                        other.status.is_terminal(),
                        "{} dispatched before upstream {}",
                        id,
                        other.id
                    );
                }
            }
        }
        Ok(dispatched)
    };

    let step = scheduler.start();
    running.extend(check(&scheduler, step.scheduled_ids())?);

    while let Some(id) = running.pop_front() {
        steps += 1;
        prop_assert!(steps <= 1000, "simulation did not terminate");

        let outcome = if failing.contains(&position[&id]) {
            TaskOutcome::Failed(TaskError::ExitStatus(1))
        } else {
            TaskOutcome::Success
        };
        let step = scheduler.step_completion(&id, outcome);
        running.extend(check(&scheduler, step.scheduled_ids())?);
    }

    Ok(scheduler)
}

proptest! {
    #[test]
    fn every_build_terminates_within_the_worker_bound(
        build in build_strategy(12),
        workers in 1..4usize,
        failing in proptest::collection::hash_set(0..12usize, 0..3),
    ) {
        let scheduler = simulate(&build, workers, &failing)?;

        prop_assert!(scheduler.is_finished());
        for (id, status) in scheduler.statuses() {
            prop_assert!(status.is_terminal(), "{} ended {}", id, status);
        }
    }

    #[test]
    fn without_failures_every_enabled_task_succeeds(
        build in build_strategy(12),
        workers in 1..4usize,
    ) {
        let scheduler = simulate(&build, workers, &HashSet::new())?;

        for (i, id) in build.ids.iter().enumerate() {
            let status = scheduler.status_of(id).cloned();
            if build.disabled.contains(&i) {
                prop_assert!(matches!(status, Some(TaskStatus::Skipped(_))), "{}", id);
            } else {
                prop_assert_eq!(status, Some(TaskStatus::Succeeded));
            }
        }
    }
}
