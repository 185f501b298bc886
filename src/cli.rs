// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;
use crate::types::ReportFormat;

/// Command-line arguments for `buildgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildgraph",
    version,
    about = "Run tasks of a multi-module build in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the build file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path(), global = true)]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the selected tasks and everything they depend on.
    Build(BuildArgs),
    /// List modules and their tasks.
    Tasks,
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Tasks or modules to run: `web:test`, `:web`, or a bare task name
    /// such as `test` for every module's `test`.
    #[arg(value_name = "SELECTOR", required_unless_present = "all")]
    pub selectors: Vec<String>,

    /// Run every registered task.
    #[arg(long, conflicts_with = "selectors")]
    pub all: bool,

    /// Maximum number of tasks running at once (default: number of CPUs).
    #[arg(long, short = 'j', value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Keep running dependents of failed tasks.
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Print the plan, grouped into parallel levels, without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Default per-task deadline, e.g. `30s` or `10m`.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Write the aggregated coverage report to this file.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = ReportFormat::Csv)]
    pub report_format: ReportFormat,

    /// Fail the build when no coverage could be aggregated.
    #[arg(long)]
    pub require_report: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_flags_parse() {
        let args = CliArgs::try_parse_from([
            "buildgraph",
            "build",
            "web:test",
            "--workers",
            "2",
            "--timeout",
            "90s",
            "--report-format",
            "json",
        ])
        .unwrap();

        let Command::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.selectors, vec!["web:test"]);
        assert_eq!(build.workers, Some(2));
        assert_eq!(build.timeout, Some(Duration::from_secs(90)));
        assert_eq!(build.report_format, ReportFormat::Json);
        assert_eq!(args.config, default_config_path());
    }

    #[test]
    fn build_needs_a_selector_or_all() {
        assert!(CliArgs::try_parse_from(["buildgraph", "build"]).is_err());
        assert!(CliArgs::try_parse_from(["buildgraph", "build", "--all"]).is_ok());
        assert!(CliArgs::try_parse_from(["buildgraph", "build", "--workers", "0", "--all"]).is_err());
    }
}
