// tests/integration/main.rs

mod config_errors;
mod fs_abstraction;
mod shell_tasks;
