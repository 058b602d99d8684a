//! Error types shared by hooks, adapters and the orchestrator.

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;

/// Boxed foreign error accepted from adapter implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by hooks and adapters.
///
/// The orchestrator does not look at the variant: every failure on the
/// normal path is routed to the error path the same way.
#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Source(#[from] BoxError),

    #[error("saga task failed to join: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SagaError {
    /// Message-only failure.
    pub fn failed(message: impl Into<String>) -> Self {
        SagaError::Failed(message.into())
    }

    /// Returns the error message.
    pub fn message(&self) -> String {
        match self {
            SagaError::Failed(msg) => msg.clone(),
            SagaError::Source(e) => e.to_string(),
            SagaError::Join(e) => e.to_string(),
        }
    }

    /// Returns true if the spawned task panicked or was aborted.
    pub fn is_join(&self) -> bool {
        matches!(self, SagaError::Join(_))
    }
}
