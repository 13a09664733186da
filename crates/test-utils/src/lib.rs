//! Shared helpers for the `fetchdag` integration tests.

pub mod builders;
pub mod fake_source;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness.
///
/// Captured output only shows up for failing tests (or with `--nocapture`).
/// `RUST_LOG` picks the filter; without it only warnings and errors from
/// the crate are printed, which keeps failed-fetch logs visible.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("fetchdag=warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .init();
    });
}

/// Fail the test instead of hanging when a scheduled source never settles.
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("source resolution did not settle within 5 seconds")
}
