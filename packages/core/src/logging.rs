//! Logging setup for applications embedding the database
//!
//! The library itself only emits `tracing` events. Binaries and tests call
//! [`init`] once to print them.

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` when a global subscriber was already installed.
pub fn init() -> bool {
    init_with_default("info")
}

/// Same as [`init`] with a custom fallback filter
pub fn init_with_default(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok()
}
