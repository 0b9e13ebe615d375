//! Process-wide logging setup shared by the binaries.

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig};

/// Initialize tracing from the environment (`RUST_LOG`, `RESELLSYNC_LOG_FORMAT`).
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    crate::tracing::init(&TracingConfig::from_env());
}
