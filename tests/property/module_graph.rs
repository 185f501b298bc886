// tests/property/module_graph.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use buildgraph::graph::ModuleGraph;
use buildgraph::types::ModuleId;

/// Dependency lists where module `i` only depends on modules `0..i`, plus a
/// shuffled declaration order so forward references get exercised.
fn acyclic_modules(max: usize) -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1..=max).prop_flat_map(|n| {
        let deps = proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n)
            .prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, ds)| {
                        let unique: HashSet<usize> =
                            ds.into_iter().filter(|_| i > 0).map(|d| d % i).collect();
                        unique.into_iter().collect()
                    })
                    .collect::<Vec<Vec<usize>>>()
            });
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        (deps, order)
    })
}

fn module(i: usize) -> ModuleId {
    ModuleId::new(&format!("m{i}"))
}

proptest! {
    #[test]
    fn topological_order_puts_dependencies_first((deps, order) in acyclic_modules(10)) {
        let mut graph = ModuleGraph::new();
        for &i in &order {
            graph
                .add_module(module(i), deps[i].iter().map(|&d| module(d)).collect())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
        prop_assert!(graph.ensure_complete().is_ok());

        let position: HashMap<ModuleId, usize> = graph
            .topological_order()
            .enumerate()
            .map(|(rank, id)| (id.clone(), rank))
            .collect();
        prop_assert_eq!(position.len(), deps.len());

        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                prop_assert!(position[&module(d)] < position[&module(i)], "m{} before m{}", i, d);
            }
        }
    }

    #[test]
    fn closing_a_path_is_always_rejected(
        (deps, order) in acyclic_modules(10),
        pick in any::<usize>(),
    ) {
        let n = deps.len();
        let x = pick % n;
        let late = ModuleId::new("late");

        // `x` forward-references `late`, declared last.
        let mut graph = ModuleGraph::new();
        for &i in &order {
            let mut ds: Vec<ModuleId> = deps[i].iter().map(|&d| module(d)).collect();
            if i == x {
                ds.push(late.clone());
            }
            graph
                .add_module(module(i), ds)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        // Any module downstream of `x` (or `x` itself) closes the loop.
        let downstream = (0..n)
            .filter(|&j| j == x || graph.is_upstream_of(&module(x), &module(j)))
            .max()
            .unwrap_or(x);
        prop_assert!(graph.add_module(late, vec![module(downstream)]).is_err());
    }
}
