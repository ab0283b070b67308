//! In-memory board store.

use std::sync::atomic::{AtomicUsize, Ordering};
use mission_core::Board;
use tokio::sync::Mutex;
use super::{BoardStore, Result};

/// Board store kept in process memory. Snapshots are cloned in and out, so
/// callers still work on private copies.
#[derive(Default)]
pub struct MemoryBoardStore {
    board: Mutex<Option<Board>>,
    writes: AtomicUsize,
}

impl MemoryBoardStore {
    /// Create an empty store (reads yield the skeleton).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `board`.
    pub fn with_board(board: Board) -> Self {
        Self {
            board: Mutex::new(Some(board)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl BoardStore for MemoryBoardStore {
    async fn get_snapshot(&self) -> Board {
        self.board
            .lock()
            .await
            .clone()
            .unwrap_or_else(Board::skeleton)
    }

    async fn put_snapshot(&self, board: &Board) -> Result<()> {
        *self.board.lock().await = Some(board.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
