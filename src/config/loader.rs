// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::ConfigResult;

/// Load a configuration file and return the raw, unvalidated `RawConfigFile`.
///
/// Only TOML deserialization happens here. Use [`load_and_validate`] for the
/// semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

pub fn parse_str(contents: &str) -> ConfigResult<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Load a configuration file and validate it.
///
/// Checks that at least one module exists, that module dependencies name
/// declared modules, and that durations, regexes and task names parse.
/// Cross-task references are checked later, when the project is linked.
pub fn load_and_validate(path: impl AsRef<Path>) -> ConfigResult<ConfigFile> {
    let raw = load_from_path(path)?;
    ConfigFile::try_from(raw)
}

/// `buildgraph.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("buildgraph.toml")
}

/// Directory that task commands run in and report paths are relative to.
pub fn project_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
