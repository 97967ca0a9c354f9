//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use edusync_classify::SchemaError;
use edusync_connector::ConnectorError;

use crate::gateway::GatewayError;

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the reconciliation engine and its service surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid options, checked before any fetching begins. Run-fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The active classification schema failed to load or compile.
    /// Run-fatal; there is no fallback to a built-in schema.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The identity provider failed during the fetch phase. Phase-fatal.
    #[error("Fetch error: {0}")]
    Fetch(#[from] ConnectorError),

    /// The local state gateway rejected a read needed for diffing.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A sync run is already active for this service.
    #[error("A sync run is already active: {run_id}")]
    AlreadyRunning {
        /// ID of the active run.
        run_id: Uuid,
    },

    /// No run with the given ID is known to this service.
    #[error("Sync run not found: {run_id}")]
    RunNotFound {
        /// The unknown run ID.
        run_id: Uuid,
    },

    /// The run cannot be cancelled in its current state.
    #[error("Run {run_id} is {status} and cannot be cancelled")]
    NotCancellable {
        /// ID of the run.
        run_id: Uuid,
        /// Its terminal status.
        status: String,
    },

    /// I/O error while persisting run state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let run_id = Uuid::new_v4();
        let err = EngineError::AlreadyRunning { run_id };
        assert!(err.to_string().contains(&run_id.to_string()));

        let err = EngineError::configuration("worker_count must be positive");
        assert!(err.to_string().contains("worker_count"));
    }
}
