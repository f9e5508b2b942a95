//! Error types for Cascade gateway operations.

use thiserror::Error;

/// Main error type for Cascade operations
#[derive(Error, Debug)]
pub enum CascadeError {
    /// Aggregate tool count of tracked workers reached the ceiling
    #[error("MCP tool count has reached the limit: {max}")]
    CapacityExceeded { max: usize },

    /// Invalid configuration in the named scope (settings file, worker catalog, filter)
    #[error("invalid config for '{0}': {1}")]
    InvalidConfig(String, String),

    /// External worker process could not be started
    #[error("failed to spawn worker '{0}': {1}")]
    WorkerSpawn(String, String),

    /// Forwarding a call to an external worker failed (unreachable, bad status, bad JSON)
    #[error("relay to worker '{0}' failed: {1}")]
    WorkerRelay(String, String),

    /// Malformed request input (query parameters, tool arguments)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No item with the given id
    #[error("item {0} not found")]
    ItemNotFound(i64),

    /// Tool-count probe against a running worker failed
    #[error("probe of '{0}' failed: {1}")]
    Probe(String, String),
}

/// Result type alias for Cascade operations
pub type Result<T> = std::result::Result<T, CascadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_display() {
        let err = CascadeError::CapacityExceeded { max: 50 };
        assert_eq!(err.to_string(), "MCP tool count has reached the limit: 50");
    }

    #[test]
    fn test_invalid_config_display() {
        let err = CascadeError::InvalidConfig(
            "playwright".to_string(),
            "worker requires a non-empty 'command'".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "invalid config for 'playwright': worker requires a non-empty 'command'"
        );
    }

    #[test]
    fn test_relay_display() {
        let err = CascadeError::WorkerRelay("pw".to_string(), "connection refused".to_string());
        assert_eq!(err.to_string(), "relay to worker 'pw' failed: connection refused");
    }
}
