// tests/property/main.rs

mod module_graph;
mod scheduler;
