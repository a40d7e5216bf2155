//! Logging setup for cluster node processes

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from the environment (`RUST_LOG`)
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a fallback filter for when `RUST_LOG` is unset.
///
/// Render nodes usually run unattended; `info` keeps per-frame chatter out
/// of the logs while still recording lifecycle transitions.
pub fn init_with_default(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}
