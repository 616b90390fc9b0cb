//! Tracing setup shared by the relay binaries

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber; `RUST_LOG` wins over `default_level`
///
/// Safe to call more than once (later calls are ignored), which keeps tests
/// and binaries on the same path.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
