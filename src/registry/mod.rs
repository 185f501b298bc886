// src/registry/mod.rs

//! Task definitions and their cross-module constraints.
//!
//! - [`task_def`] describes a task as declared, with unresolved references.
//! - [`task_registry`] collects definitions and links them.
//! - [`linked`] is the immutable, fully-resolved [`TaskGraph`].
//! - [`plugins`] holds registration callbacks applied per module.

pub mod linked;
pub mod plugins;
pub mod task_def;
pub mod task_registry;

pub use linked::{LinkedTask, TaskGraph};
pub use plugins::{PluginFn, PluginSet};
pub use task_def::{TaskAction, TaskDef, TaskRef};
pub use task_registry::TaskRegistry;
