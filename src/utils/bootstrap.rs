//! Bootstrap utilities for hosts embedding the orchestrator.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the ENTITY_SAGA_LOG environment variable.
///
/// Defaults to "info" level if ENTITY_SAGA_LOG is not set. Panics if a
/// global subscriber is already installed; see [`try_init_tracing`].
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init_tracing`], but reports an already-installed subscriber
/// instead of panicking.
pub fn try_init_tracing() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_reported() {
        // Another test in this binary may have installed one already.
        let _ = try_init_tracing();
        assert!(try_init_tracing().is_err());
    }
}
