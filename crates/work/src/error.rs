//! Board operation errors.

use mission_quality::GuardRejection;
use mission_storage::StorageError;

/// Errors returned by board operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// Malformed request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Refused by the Done gate
    #[error("Transition refused: {0}")]
    Guard(#[from] GuardRejection),

    /// Unknown mission or column
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BoardError {
    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Guard(rejection) => rejection.code(),
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "storage_error",
        }
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
