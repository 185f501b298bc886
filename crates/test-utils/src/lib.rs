//! Shared fixtures for buildgraph's test suites: task graph builders, a
//! scripted executor and tracing setup.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for a single awaited build step in tests.
const STEP_LIMIT: Duration = Duration::from_secs(5);

/// Install a test-captured tracing subscriber once per test binary.
///
/// Scheduler and runner logs show up only for failing tests; filter them
/// with `RUST_LOG`, e.g. `RUST_LOG=buildgraph::dag=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it has not finished within five seconds, as
/// happens when a build waits on a task that never completes.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(STEP_LIMIT, f).await {
        Ok(value) => value,
        Err(_) => panic!("build step still pending after {STEP_LIMIT:?}"),
    }
}
