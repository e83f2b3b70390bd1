//! Logging setup and the verbose-gated bootstrap logger.

use std::fmt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Returns `false` if a global subscriber was already installed, which is the
/// normal case when the host process owns logging.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Election diagnostics, emitted only when the entry point asked for them.
#[derive(Debug, Clone)]
pub(crate) struct BootstrapLogger {
    enabled: bool,
    owner: String,
}

impl BootstrapLogger {
    pub(crate) fn new(enabled: bool, owner: &str) -> Self {
        Self {
            enabled,
            owner: owner.to_string(),
        }
    }

    pub(crate) fn info(&self, message: fmt::Arguments<'_>) {
        if self.enabled {
            info!(owner = %self.owner, "[quorum] {}", message);
        }
    }

    pub(crate) fn warn(&self, message: fmt::Arguments<'_>) {
        if self.enabled {
            warn!(owner = %self.owner, "[quorum] {}", message);
        }
    }
}
