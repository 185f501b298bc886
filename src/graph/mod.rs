// src/graph/mod.rs

//! Module dependency graph.
//!
//! - [`module_graph`] holds modules in declaration order plus their direct
//!   dependency and dependent edges, and rejects cycles as they are added.

pub mod module_graph;

pub use module_graph::{Module, ModuleGraph, TopologicalOrder};
