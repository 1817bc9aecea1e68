//! Error types for hub construction.

use thiserror::Error;

/// Failures creating an [`crate::EventHub`].
#[derive(Debug, Error)]
pub enum HubError {
    /// The dispatch worker thread could not be started.
    #[error("Failed to spawn event hub worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The configuration cannot be used.
    #[error("Invalid hub configuration: {0}")]
    Config(String),
}

/// Result type for hub construction.
pub type HubResult<T> = Result<T, HubError>;
