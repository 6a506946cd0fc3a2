use thiserror::Error;

use tickler_shared::{InvalidData, ParseError, TaskError, UserId};
use tickler_store::StoreError;

/// Errors returned by task service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Validation, parse, not-found and already-done failures.
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A record could not be encoded.
    #[error("Record codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("No profile registered for user {0}")]
    UnknownUser(UserId),
}

impl From<InvalidData> for ServiceError {
    fn from(e: InvalidData) -> Self {
        Self::Task(e.into())
    }
}

impl From<ParseError> for ServiceError {
    fn from(e: ParseError) -> Self {
        Self::Task(e.into())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
