// src/graph/module_graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::debug;

use crate::errors::{ConfigError, ConfigResult};
use crate::types::ModuleId;

/// A buildable unit: its path, the modules it depends on and some metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    /// Direct dependencies, in declaration order.
    pub dependencies: Vec<ModuleId>,
    pub description: Option<String>,
    /// Plugins applied to this module, in application order.
    pub plugins: Vec<String>,
}

impl Module {
    pub fn new(id: ModuleId, dependencies: Vec<ModuleId>) -> Self {
        Self {
            id,
            dependencies,
            description: None,
            plugins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct ModuleNode {
    module: Module,
    /// Direct dependents: modules listing this one as a dependency.
    dependents: Vec<ModuleId>,
}

/// Modules and their directed dependency edges.
///
/// The graph is kept acyclic at all times: [`ModuleGraph::add_module`] rejects
/// any edge set that would close a cycle. Dependencies may point at modules
/// that are added later; [`ModuleGraph::ensure_complete`] checks that every
/// reference was eventually satisfied.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    /// Nodes in declaration order.
    nodes: Vec<ModuleNode>,
    index: HashMap<ModuleId, usize>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module with the given direct dependencies.
    pub fn add_module(&mut self, id: ModuleId, dependencies: Vec<ModuleId>) -> ConfigResult<()> {
        self.insert(Module::new(id, dependencies))
    }

    /// Add a fully described module.
    pub fn insert(&mut self, mut module: Module) -> ConfigResult<()> {
        if self.index.contains_key(&module.id) {
            return Err(ConfigError::DuplicateModule(module.id));
        }

        let mut seen = HashSet::new();
        module.dependencies.retain(|dep| seen.insert(dep.clone()));

        if let Some(cycle) = self.find_cycle_through(&module) {
            return Err(ConfigError::CyclicDependency {
                cycle: cycle
                    .iter()
                    .map(ModuleId::as_str)
                    .collect::<Vec<_>>()
                    .join(" -> "),
            });
        }

        let id = module.id.clone();

        // Existing modules that referenced this one before it was declared.
        let early_dependents: Vec<ModuleId> = self
            .nodes
            .iter()
            .filter(|n| n.module.dependencies.contains(&id))
            .map(|n| n.module.id.clone())
            .collect();

        for dep in &module.dependencies {
            if let Some(&i) = self.index.get(dep) {
                self.nodes[i].dependents.push(id.clone());
            }
        }

        debug!(module = %id, deps = ?module.dependencies, "module added to graph");

        self.index.insert(id, self.nodes.len());
        self.nodes.push(ModuleNode {
            module,
            dependents: early_dependents,
        });
        Ok(())
    }

    /// Fail with `UnknownModule` if any dependency was never declared.
    pub fn ensure_complete(&self) -> ConfigResult<()> {
        for node in &self.nodes {
            for dep in &node.module.dependencies {
                if !self.index.contains_key(dep) {
                    return Err(ConfigError::UnknownModule {
                        module: dep.to_string(),
                        from: format!("module '{}'", node.module.id),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.index.get(id).map(|&i| &self.nodes[i].module)
    }

    /// All modules in declaration order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.nodes.iter().map(|n| &n.module)
    }

    /// Immediate dependencies of a module.
    pub fn dependencies_of(&self, id: &ModuleId) -> &[ModuleId] {
        self.index
            .get(id)
            .map(|&i| self.nodes[i].module.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Modules that directly depend on `id`.
    pub fn dependents_of(&self, id: &ModuleId) -> &[ModuleId] {
        self.index
            .get(id)
            .map(|&i| self.nodes[i].dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every module `id` depends on, directly or transitively.
    pub fn upstream_of(&self, id: &ModuleId) -> HashSet<ModuleId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&ModuleId> = self.dependencies_of(id).iter().collect();

        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                stack.extend(self.dependencies_of(next));
            }
        }

        seen
    }

    /// Whether `upstream` is a direct or transitive dependency of `module`.
    pub fn is_upstream_of(&self, upstream: &ModuleId, module: &ModuleId) -> bool {
        self.upstream_of(module).contains(upstream)
    }

    /// Modules ordered so that each one comes after all of its dependencies.
    ///
    /// The sequence is produced lazily; ties are broken by declaration order.
    pub fn topological_order(&self) -> TopologicalOrder<'_> {
        let in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| {
                n.module
                    .dependencies
                    .iter()
                    .filter(|d| self.index.contains_key(*d))
                    .count()
            })
            .collect();

        let ready = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        TopologicalOrder {
            graph: self,
            in_degree,
            ready,
        }
    }

    /// Depth-first search from the new module through existing edges, with an
    /// in-progress path as the back-edge marker. Returns the cycle path if the
    /// new module would close one.
    fn find_cycle_through(&self, module: &Module) -> Option<Vec<ModuleId>> {
        let mut done: HashSet<ModuleId> = HashSet::new();
        let mut in_progress: Vec<ModuleId> = vec![module.id.clone()];

        for dep in &module.dependencies {
            if let Some(cycle) = self.visit(dep, &mut in_progress, &mut done) {
                return Some(cycle);
            }
        }

        None
    }

    fn visit(
        &self,
        id: &ModuleId,
        in_progress: &mut Vec<ModuleId>,
        done: &mut HashSet<ModuleId>,
    ) -> Option<Vec<ModuleId>> {
        if let Some(start) = in_progress.iter().position(|m| m == id) {
            let mut cycle = in_progress[start..].to_vec();
            cycle.push(id.clone());
            return Some(cycle);
        }

        if done.contains(id) {
            return None;
        }

        in_progress.push(id.clone());
        for dep in self.dependencies_of(id) {
            if let Some(cycle) = self.visit(dep, in_progress, done) {
                return Some(cycle);
            }
        }
        in_progress.pop();
        done.insert(id.clone());

        None
    }
}

/// Lazy Kahn-style traversal returned by [`ModuleGraph::topological_order`].
pub struct TopologicalOrder<'a> {
    graph: &'a ModuleGraph,
    in_degree: Vec<usize>,
    ready: BinaryHeap<Reverse<usize>>,
}

impl<'a> Iterator for TopologicalOrder<'a> {
    type Item = &'a ModuleId;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(i) = self.ready.pop()?;
        let node = &self.graph.nodes[i];

        for dependent in &node.dependents {
            if let Some(&j) = self.graph.index.get(dependent) {
                self.in_degree[j] -= 1;
                if self.in_degree[j] == 0 {
                    self.ready.push(Reverse(j));
                }
            }
        }

        Some(&node.module.id)
    }
}
