//! Errors raised by remote services and object storage

use thiserror::Error;

/// Error types for cloud operations
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Rejected by service: {0}")]
    Validation(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Storage error: {0}")]
    Storage(object_store::Error),

    #[error("Invalid location: {0}")]
    InvalidUri(String),
}

impl CloudError {
    /// Whether retrying the same request may succeed
    ///
    /// Everything else (a missing pipeline, bad credentials, a rejected
    /// request) fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CloudError::Transport(_) | CloudError::Throttled(_) | CloudError::Unavailable(_)
        )
    }
}

impl From<object_store::Error> for CloudError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => CloudError::NotFound(path),
            other => CloudError::Storage(other),
        }
    }
}
