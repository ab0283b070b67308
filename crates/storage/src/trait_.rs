//! Board store trait abstraction.

use async_trait::async_trait;
use mission_core::Board;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Whole-document store for the board snapshot.
///
/// There is no locking and no version check: every caller loads a fresh
/// snapshot, mutates its own copy and writes the whole document back. The
/// last durable save wins.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Load the current snapshot.
    ///
    /// Never fails: a missing or unreadable document yields
    /// [`Board::skeleton`].
    async fn get_snapshot(&self) -> Board;

    /// Atomically replace the whole document.
    async fn put_snapshot(&self, board: &Board) -> Result<()>;
}
