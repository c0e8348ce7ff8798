//! Backend Error Types

use thiserror::Error;

/// Errors returned by a native audio middleware call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Event not found in any loaded bank: {0}")]
    EventNotFound(String),

    #[error("Sound key not found: {0}")]
    SoundNotFound(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(u64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Backend not initialized")]
    Uninitialized,

    #[error("Native call failed: {0}")]
    CallFailed(String),
}

impl BackendError {
    /// Whether this failure is a transient "not loaded yet" condition
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackendError::EventNotFound(_) | BackendError::SoundNotFound(_)
        )
    }
}

/// Result type alias for native calls
pub type BackendResult<T> = Result<T, BackendError>;
