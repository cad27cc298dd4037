//! Tracing/logging setup shared by embedders.
//!
//! The decision layer only *emits* `tracing` events; wiring a subscriber
//! is the embedding process's job. This crate gives embedders a default.

pub mod tracing;

/// Initialize process-wide tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
