// src/dag/cycles.rs

use std::collections::HashSet;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::{DiGraphMap, NodeTrait};

/// Find one cycle in `graph`, returned as a closed path (`a, b, a`).
pub(crate) fn find_cycle<N: NodeTrait, E>(graph: &DiGraphMap<N, E>) -> Option<Vec<N>> {
    for scc in tarjan_scc(graph) {
        let start = scc[0];
        if scc.len() == 1 && !graph.contains_edge(start, start) {
            continue;
        }

        let members: HashSet<N> = scc.iter().copied().collect();
        let mut path = vec![start];
        let mut visited = HashSet::new();
        if walk_back(graph, start, start, &members, &mut path, &mut visited) {
            return Some(path);
        }
    }
    None
}

fn walk_back<N: NodeTrait, E>(
    graph: &DiGraphMap<N, E>,
    current: N,
    target: N,
    members: &HashSet<N>,
    path: &mut Vec<N>,
    visited: &mut HashSet<N>,
) -> bool {
    for next in graph.neighbors_directed(current, Direction::Outgoing) {
        if !members.contains(&next) {
            continue;
        }
        if next == target {
            path.push(target);
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if walk_back(graph, next, target, members, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}
