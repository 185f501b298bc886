// tests/integration/config_errors.rs

use std::io::Write;

use tempfile::NamedTempFile;

use buildgraph::cli::CliArgs;
use buildgraph::errors::{BuildError, ConfigError};
use buildgraph::load_project;
use clap::Parser;

fn config_file(toml_str: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{toml_str}").unwrap();
    file
}

fn config_error(toml_str: &str) -> ConfigError {
    let file = config_file(toml_str);
    match load_project(file.path()) {
        Err(BuildError::Config(err)) => err,
        Err(e) => panic!("Expected config error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn module_cycle_is_reported_with_its_path() {
    let err = config_error(
        r#"
[module.core]
depends_on = ["web"]

[module.api]
depends_on = ["core"]

[module.web]
depends_on = ["api"]
"#,
    );

    match err {
        ConfigError::CyclicDependency { cycle } => {
            for module in [":core", ":api", ":web"] {
                assert!(cycle.contains(module), "{cycle}");
            }
        }
        other => panic!("Expected CyclicDependency, got: {:?}", other),
    }
}

#[test]
fn unknown_task_reference_names_the_reference() {
    let err = config_error(
        r#"
[module.core.task.test]
cmd = "true"
depends_on = ["compile"]
"#,
    );

    match err {
        ConfigError::UnknownTask { reference, .. } => assert!(reference.contains("compile")),
        other => panic!("Expected UnknownTask, got: {:?}", other),
    }
}

#[test]
fn depending_on_a_downstream_module_is_illegal() {
    let err = config_error(
        r#"
[module.core.task.test]
cmd = "true"
depends_on = [":api:test"]

[module.api]
depends_on = ["core"]

[module.api.task.test]
cmd = "true"
"#,
    );

    assert!(
        matches!(err, ConfigError::IllegalTaskDependency { .. }),
        "{err:?}"
    );
}

#[test]
fn task_cycle_inside_a_module_is_rejected() {
    let err = config_error(
        r#"
[module.core.task.a]
depends_on = ["b"]

[module.core.task.b]
depends_on = ["a"]
"#,
    );

    match err {
        ConfigError::CyclicTaskDependency { cycle } => {
            assert!(cycle.contains(":core:a") && cycle.contains(":core:b"), "{cycle}");
        }
        other => panic!("Expected CyclicTaskDependency, got: {:?}", other),
    }
}

#[test]
fn unknown_keys_are_rejected() {
    let err = config_error(
        r#"
[module.core.task.test]
command = "true"
"#,
    );

    assert!(matches!(err, ConfigError::Toml(_)), "{err:?}");
}

#[tokio::test]
async fn config_errors_exit_with_code_two() {
    let file = config_file(
        r#"
[module.core]
depends_on = ["missing"]
"#,
    );
    let path = file.path().to_string_lossy().into_owned();
    let args =
        CliArgs::try_parse_from(["buildgraph", "--config", path.as_str(), "build", "--all"]).unwrap();

    let err = buildgraph::run(args).await.unwrap_err();
    assert!(matches!(
        err,
        BuildError::Config(ConfigError::UnknownModule { .. })
    ));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn unknown_selector_is_a_config_error() {
    let file = config_file(
        r#"
[module.core.task.test]
cmd = "true"
"#,
    );
    let path = file.path().to_string_lossy().into_owned();
    let args = CliArgs::try_parse_from([
        "buildgraph",
        "--config",
        path.as_str(),
        "build",
        "core:deploy",
    ])
    .unwrap();

    let err = buildgraph::run(args).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
