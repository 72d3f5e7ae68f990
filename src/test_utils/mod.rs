//! Test utilities for the launcher.
//!
//! Shared by unit tests and the integration suite (through the `test-utils`
//! feature): an in-memory [`MockFetcher`], signed release fixtures and test
//! logging.
//!
//! ```rust,no_run
//! use signed_launcher::test_utils::{MockFetcher, ReleaseFixture};
//!
//! let fixture = ReleaseFixture::new("tool-linux");
//! let fetcher = MockFetcher::new();
//! fixture.publish(&fetcher);
//! ```

pub mod fetcher;
pub mod fixtures;

pub use fetcher::MockFetcher;
pub use fixtures::ReleaseFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`. With neither set, tests run
/// silently.
///
/// ```bash
/// RUST_LOG=signed_launcher=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
