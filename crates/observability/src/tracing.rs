//! Tracing/logging initialization.
//!
//! Audit sinks log decisions at debug/info/warn and engine failures are
//! traced per check kind, so the filter matters: run with
//! `RUST_LOG=webgate_authz=trace` to see why individual checks failed.

use tracing_subscriber::EnvFilter;

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default.to_string()))
}

/// Initialize with JSON output and a filter taken from `RUST_LOG`
/// (default `info`).
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}

/// Human-readable variant for local development, same filter rules.
pub fn init_compact() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("info"))
        .compact()
        .try_init();
}
