use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    ConnectionFailed(String),
    #[error("cache operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
