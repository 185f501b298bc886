// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the commands of scheduled tasks with `tokio::process::Command` and
//! reports back to the runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with a fake implementation.
//! - [`task_runner`] runs one task: timeout, cancellation, report fragment.
//! - [`policy`] implements warnings-as-errors.

pub mod backend;
pub mod policy;
pub mod task_runner;

pub use backend::{ExecContext, ExecutorBackend, RealExecutorBackend};
pub use policy::WarningPolicy;
