//! Test utilities for soldeploy
//!
//! Shared helpers for unit and integration tests: once-only logging setup and
//! an in-memory platform that plays every collaborator role with scripted
//! failures.
//!
//! # Example
//!
//! ```rust,no_run
//! use soldeploy_cli::test_utils::{MemoryPlatform, init_test_logging};
//! use soldeploy_cli::core::Resource;
//!
//! init_test_logging(None);
//! let platform = MemoryPlatform::new().with_resource(Resource::new("a".repeat(32), "Web Map"));
//! platform.fail_create("a".repeat(32), "quota exceeded");
//! ```

pub mod fixtures;

pub use fixtures::{MemoryPlatform, PlatformCall, ScriptedConfirm};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Installs a test-writer subscriber once per process. Uses `level` when
/// given and `RUST_LOG` otherwise; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=soldeploy_cli=debug cargo test
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
            .with_thread_ids(false)
            .try_init();
    });
}
