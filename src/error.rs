//! Adapter Error Types

use thiserror::Error;

use crate::client::{EngineError, EngineErrorLocation};
use crate::execution::TimeoutError;

/// Errors surfaced by the adapter to its callers
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    /// The remote engine reported a query failure
    #[error("{0}")]
    RemoteClient(#[from] EngineError),

    /// A pool task panicked before resolving
    #[error("Pool task failed: {0}")]
    PoolRejection(String),

    /// The task was aborted or the adapter was closed
    #[error("Query execution was cancelled")]
    Cancelled,

    /// The remote client dropped the session without a terminal callback
    #[error("Remote client finished without reporting success or failure")]
    Abandoned,

    /// Caller-supplied timeout elapsed before the query finished
    #[error("Query timeout: {0}")]
    Timeout(#[from] TimeoutError),

    /// HTTP transport or protocol decoding failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Target is missing a component required by the statement
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl AdapterError {
    /// Source location reported by the engine, if any
    pub fn error_location(&self) -> Option<&EngineErrorLocation> {
        match self {
            AdapterError::RemoteClient(err) => err.error_location.as_ref(),
            _ => None,
        }
    }
}

impl From<figment::Error> for AdapterError {
    fn from(err: figment::Error) -> Self {
        AdapterError::Config(err.to_string())
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_remote_error_display_is_engine_message() {
        let err = AdapterError::from(EngineError::new("line 1:8: Column 'x' cannot be resolved"));
        assert_eq!(err.to_string(), "line 1:8: Column 'x' cannot be resolved");
    }

    #[test]
    fn test_error_location_only_for_remote_errors() {
        let mut engine = EngineError::new("bad");
        engine.error_location = Some(EngineErrorLocation {
            line_number: 3,
            column_number: 14,
        });
        let err = AdapterError::RemoteClient(engine);
        let loc = err.error_location().unwrap();
        assert_eq!(loc.line_number, 3);
        assert_eq!(loc.column_number, 14);

        assert!(AdapterError::Cancelled.error_location().is_none());
        assert!(AdapterError::PoolRejection("boom".into())
            .error_location()
            .is_none());
    }

    #[test]
    fn test_timeout_error_conversion() {
        let err: AdapterError = TimeoutError {
            timeout: Duration::from_secs(1),
            elapsed: Duration::from_secs(2),
        }
        .into();
        assert!(err.to_string().starts_with("Query timeout:"));
    }
}
