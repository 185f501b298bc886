use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use buildgraph::dag::ScheduledTask;
use buildgraph::engine::{BuildEvent, BuildListener, RuntimeEvent, TaskOutcome};
use buildgraph::errors::{Result, TaskError};
use buildgraph::exec::ExecutorBackend;
use buildgraph::report::{ReportAggregator, ReportFragment};
use buildgraph::types::TaskId;

/// A scripted executor that:
/// - records which tasks were started, in dispatch order
/// - reports `Success` unless a failure was scripted for the task
/// - hands scripted report fragments to an aggregator on success
/// - keeps "hanging" tasks running until the build is cancelled.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    started: Arc<Mutex<Vec<TaskId>>>,
    failures: HashMap<TaskId, TaskError>,
    fragments: HashMap<TaskId, ReportFragment>,
    hanging: HashSet<TaskId>,
    aggregator: Option<Arc<ReportAggregator>>,
    cancel: CancellationToken,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            started: Arc::new(Mutex::new(Vec::new())),
            failures: HashMap::new(),
            fragments: HashMap::new(),
            hanging: HashSet::new(),
            aggregator: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Shared log of started tasks.
    pub fn started(&self) -> Arc<Mutex<Vec<TaskId>>> {
        Arc::clone(&self.started)
    }

    pub fn fail(mut self, task: TaskId, error: TaskError) -> Self {
        self.failures.insert(task, error);
        self
    }

    pub fn fragment(mut self, fragment: ReportFragment) -> Self {
        self.fragments.insert(fragment.task.clone(), fragment);
        self
    }

    pub fn hang(mut self, task: TaskId) -> Self {
        self.hanging.insert(task);
        self
    }

    pub fn with_aggregator(mut self, aggregator: Arc<ReportAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn outcome(&self, task: &TaskId) -> TaskOutcome {
        if let Some(error) = self.failures.get(task) {
            return TaskOutcome::Failed(error.clone());
        }
        if let Some(aggregator) = &self.aggregator {
            if let Some(fragment) = self.fragments.get(task) {
                aggregator.collect(fragment.clone());
            }
            aggregator.record_success();
        }
        TaskOutcome::Success
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let mut completions = Vec::new();

        for t in tasks {
            self.started.lock().unwrap().push(t.id.clone());

            if self.hanging.contains(&t.id) {
                let tx = self.runtime_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    let _ = tx
                        .send(RuntimeEvent::TaskCompleted {
                            task: t.id,
                            outcome: TaskOutcome::Failed(TaskError::Cancelled),
                        })
                        .await;
                });
                continue;
            }

            let outcome = self.outcome(&t.id);
            completions.push((t.id, outcome));
        }

        let tx = self.runtime_tx.clone();
        Box::pin(async move {
            for (task, outcome) in completions {
                tx.send(RuntimeEvent::TaskCompleted { task, outcome })
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Listener that keeps every event it sees.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<BuildEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Ids of tasks in the order they were reported started.
    pub fn started(&self) -> Vec<TaskId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BuildEvent::TaskStarted(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl BuildListener for RecordingListener {
    fn on_event(&self, event: &BuildEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
