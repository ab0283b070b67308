//! Execution errors.

use mission_work::BoardError;

/// Errors from dispatching or awaiting runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Board operation failed
    #[error(transparent)]
    Board(#[from] BoardError),

    /// Worker panicked or was aborted
    #[error("Worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for execution operations.
pub type Result<T> = std::result::Result<T, EngineError>;
