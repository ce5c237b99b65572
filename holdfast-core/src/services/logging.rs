//! Logging setup
//!
//! The library only emits `tracing` events; hosts decide where they go. This
//! installs a formatting subscriber for binaries and tests that want one.
//!
//! No passwords, keys, cookies or decrypted account contents are ever logged.
//! Session ids, addresses and counts are.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directive, e.g. `holdfast_core=debug`
pub const LOG_ENV: &str = "HOLDFAST_LOG";

/// Install the global subscriber.
///
/// The filter comes from `HOLDFAST_LOG` when set, otherwise `default_filter`.
/// Returns `false` if a subscriber was already installed, so calling this
/// more than once is harmless.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Subscriber for tests: captured by the harness, quiet unless asked
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
