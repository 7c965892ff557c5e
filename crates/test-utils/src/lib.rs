//! Shared helpers for taskdag's unit, integration and property tests.

pub mod actions;
pub mod builders;
pub mod recorder;

use std::future::Future;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Upper bound for a single scheduler run in tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-friendly subscriber once per test binary.
///
/// Output goes through the libtest writer, so it only shows up for failing
/// tests (or with `--nocapture`). Filter with `RUST_LOG`, e.g.
/// `RUST_LOG=taskdag=debug`; the default is `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Later calls find a subscriber already installed; that is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {TEST_TIMEOUT:?}"),
    }
}
