// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: `RawConfigFile` -> `ConfigFile` checks.
//! - `project.rs`: module graph, plugins and task registration.

pub mod loader;
pub mod model;
pub mod project;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, project_dir};
pub use model::{BuildSettings, ConfigFile, ModuleSpec, RawConfigFile, TaskSpec};
pub use project::Project;
