//! Error types for admission control operations.
//!
//! Only genuine faults travel through `Result`: backend I/O failures and
//! invalid configuration. Expected deny outcomes (rate limit exceeded,
//! missing key) are part of [`Decision`](crate::decision::Decision) and are
//! never surfaced as errors.

use thiserror::Error;

/// Result type for admission control operations.
pub type Result<T> = std::result::Result<T, RateWardenError>;

/// Main error type for admission control operations.
#[derive(Debug, Error)]
pub enum RateWardenError {
    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Storage-related errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Generic storage operation failed.
    #[error("{message}")]
    OperationFailed {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Failed to reach or authenticate with the backend.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection pool exhausted.
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl StorageError {
    /// Create a new operation failed error.
    pub fn operation_failed(message: impl Into<String>, retryable: bool) -> Self {
        Self::OperationFailed {
            message: message.into(),
            retryable,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::OperationFailed { retryable, .. } => *retryable,
            Self::ConnectionFailed(_) => true,
            Self::PoolExhausted => true,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid window configuration.
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// An environment variable held an unparseable value.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnvValue {
        /// Variable name.
        name: &'static str,
        /// The offending value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_retryable() {
        let err = StorageError::operation_failed("test", true);
        assert!(err.is_retryable());

        let err = StorageError::operation_failed("test", false);
        assert!(!err.is_retryable());

        let err = StorageError::PoolExhausted;
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RateWardenError::from(StorageError::ConnectionFailed("refused".into()));
        assert_eq!(err.to_string(), "Storage error: Connection failed: refused");

        let err = ConfigError::InvalidEnvValue {
            name: "RATEWARDEN_WINDOW_SECS",
            value: "abc".into(),
        };
        assert!(err.to_string().contains("RATEWARDEN_WINDOW_SECS"));
    }
}
