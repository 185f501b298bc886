// src/dag/plan.rs

//! Static execution plan: the selected tasks, their `dependsOn` closure and
//! the ordering edges between them.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::cycles::find_cycle;
use crate::errors::{ConfigError, ConfigResult};
use crate::registry::{LinkedTask, TaskGraph};
use crate::types::{ModuleId, TaskId};

/// Kind of ordering edge between two planned tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// `dependsOn`: the predecessor must succeed.
    Hard,
    /// Ordering only: the predecessor must merely be finished.
    Soft,
}

/// One node of the plan with its incoming edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub id: TaskId,
    pub hard_deps: Vec<TaskId>,
    pub soft_deps: Vec<TaskId>,
    /// Predecessors that list this task in `finalizedBy`.
    pub triggers: Vec<TaskId>,
    /// Named directly by a selector rather than pulled in by a module,
    /// `--all` or a dependency.
    pub named: bool,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    targets: Vec<TaskId>,
    /// Tasks in static order: every task after all of its predecessors.
    tasks: Vec<PlannedTask>,
    /// Groups of tasks with no ordering between them, in static order.
    levels: Vec<Vec<TaskId>>,
}

impl ExecutionPlan {
    /// Plan the given targets plus everything they transitively depend on.
    ///
    /// Fails with `CyclicTaskDependency` if the combined hard and soft edges
    /// contain a cycle.
    pub fn build(graph: &TaskGraph, targets: &[TaskId]) -> ConfigResult<Self> {
        for target in targets {
            if !graph.contains(target) {
                return Err(ConfigError::UnknownTask {
                    reference: target.to_string(),
                    from: "build targets".to_string(),
                });
            }
        }

        let closure = graph.dependency_closure(targets);
        let nodes: Vec<&LinkedTask> = graph.tasks().filter(|t| closure.contains(&t.id)).collect();
        let position: HashMap<&TaskId, usize> =
            nodes.iter().enumerate().map(|(i, t)| (&t.id, i)).collect();

        let edges = build_edges(graph, &nodes, &position);

        if let Some(cycle) = find_cycle(&edges) {
            return Err(ConfigError::CyclicTaskDependency {
                cycle: cycle
                    .iter()
                    .map(|&i| nodes[i].id.to_string())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            });
        }

        let module_rank: HashMap<&ModuleId, usize> = graph
            .modules()
            .topological_order()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect();
        let key = |i: usize| {
            let module = module_rank.get(&nodes[i].id.module).copied().unwrap_or(usize::MAX);
            Reverse((module, i))
        };

        // Kahn's algorithm, smallest (module rank, registration index) first.
        let mut in_degree: Vec<usize> = (0..nodes.len())
            .map(|i| edges.neighbors_directed(i, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<(usize, usize)>> = (0..nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .map(key)
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        let mut level = vec![0usize; nodes.len()];

        while let Some(Reverse((_, i))) = ready.pop() {
            order.push(i);
            for next in edges.neighbors_directed(i, Direction::Outgoing) {
                level[next] = level[next].max(level[i] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(key(next));
                }
            }
        }

        let mut levels: Vec<Vec<TaskId>> = Vec::new();
        let mut tasks = Vec::with_capacity(order.len());
        for &i in &order {
            let mut hard_deps = Vec::new();
            let mut soft_deps = Vec::new();
            let mut triggers = Vec::new();
            for pred in edges.neighbors_directed(i, Direction::Incoming) {
                match edges.edge_weight(pred, i) {
                    Some(EdgeKind::Hard) => hard_deps.push(nodes[pred].id.clone()),
                    Some(EdgeKind::Soft) => soft_deps.push(nodes[pred].id.clone()),
                    None => continue,
                }
                if nodes[pred].finalized_by.contains(&nodes[i].id) {
                    triggers.push(nodes[pred].id.clone());
                }
            }

            if levels.len() <= level[i] {
                levels.resize_with(level[i] + 1, Vec::new);
            }
            levels[level[i]].push(nodes[i].id.clone());

            tasks.push(PlannedTask {
                id: nodes[i].id.clone(),
                hard_deps,
                soft_deps,
                triggers,
                named: false,
            });
        }

        debug!(
            targets = targets.len(),
            tasks = tasks.len(),
            levels = levels.len(),
            "execution plan built"
        );

        Ok(Self {
            targets: targets.to_vec(),
            tasks,
            levels,
        })
    }

    /// Mark the tasks a selector named directly. A named finalizer runs even
    /// if none of its triggers succeeds.
    pub fn with_named(mut self, named: &[TaskId]) -> Self {
        for task in &mut self.tasks {
            task.named = named.contains(&task.id);
        }
        self
    }

    pub fn targets(&self) -> &[TaskId] {
        &self.targets
    }

    /// Planned tasks in static order.
    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn order(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|t| &t.id)
    }

    /// Groups of tasks that may run in parallel, in dependency order.
    pub fn levels(&self) -> &[Vec<TaskId>] {
        &self.levels
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Edges between planned nodes, keyed by index into `nodes`.
///
/// Soft edges are added first so a hard edge between the same pair wins.
fn build_edges(
    graph: &TaskGraph,
    nodes: &[&LinkedTask],
    position: &HashMap<&TaskId, usize>,
) -> DiGraphMap<usize, EdgeKind> {
    let modules = graph.modules();
    let mut upstream: HashMap<&ModuleId, HashSet<ModuleId>> = HashMap::new();
    for task in nodes {
        upstream
            .entry(&task.id.module)
            .or_insert_with(|| modules.upstream_of(&task.id.module));
    }
    let is_upstream = |a: &ModuleId, b: &ModuleId| upstream.get(b).is_some_and(|up| up.contains(a));

    let mut edges: DiGraphMap<usize, EdgeKind> = DiGraphMap::new();
    for i in 0..nodes.len() {
        edges.add_node(i);
    }

    // Implied module order.
    for (i, a) in nodes.iter().enumerate() {
        for (j, b) in nodes.iter().enumerate() {
            if is_upstream(&a.id.module, &b.id.module) {
                edges.add_edge(i, j, EdgeKind::Soft);
            }
        }
    }

    // Finalizers that are planned anyway run after their trigger. A finalizer
    // in a module upstream of its trigger keeps module order instead.
    for (i, task) in nodes.iter().enumerate() {
        for finalizer in &task.finalized_by {
            let Some(&j) = position.get(finalizer) else {
                continue;
            };
            let ordered = finalizer.module == task.id.module
                || is_upstream(&task.id.module, &finalizer.module);
            if i != j && ordered {
                edges.add_edge(i, j, EdgeKind::Soft);
            }
        }
    }

    for (j, task) in nodes.iter().enumerate() {
        for dep in &task.depends_on {
            if let Some(&i) = position.get(dep) {
                edges.add_edge(i, j, EdgeKind::Hard);
            }
        }
    }

    edges
}
