//! Core Error Types

use cadenza_platform::BackendError;
use thiserror::Error;

use crate::event::TriggerId;
use crate::object::ObjectId;

/// Errors surfaced by the lifecycle core's management API
///
/// Request execution itself never fails with an error; it reports through
/// [`crate::RequestStatus`] and the diagnostics sink.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown trigger: {0}")]
    UnknownTrigger(TriggerId),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
