//! Test-time log output.

use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`
pub const LOG_ENV_VAR: &str = "STOREFRONT_EXPECT_LOG";

/// Filter used when neither variable is set
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Resolve the log filter from the environment
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install a fmt subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
/// Set `STOREFRONT_EXPECT_LOG=storefront_expect=debug` to watch each poll.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
