//! JSON file storage implementation.
//!
//! Stores the whole board as one pretty-printed JSON document. Saves write a
//! sibling temp file and rename it over the target, so readers never observe a
//! half-written document.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use mission_core::Board;
use super::{BoardStore, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-based JSON board store.
pub struct JsonBoardStore {
    path: PathBuf,
}

impl JsonBoardStore {
    /// Create storage backed by `path`, creating its parent directory.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    /// Path of the board document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "board.json".to_string());
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
    }
}

#[async_trait::async_trait]
impl BoardStore for JsonBoardStore {
    async fn get_snapshot(&self) -> Board {
        match read_json(&self.path).await {
            Ok(Some(board)) => board,
            Ok(None) => {
                info!("No board at {}, starting from the default skeleton", self.path.display());
                Board::skeleton()
            }
            Err(e) => {
                error!(
                    "Board snapshot at {} is unreadable ({}); substituting the default skeleton",
                    self.path.display(),
                    e
                );
                Board::skeleton()
            }
        }
    }

    async fn put_snapshot(&self, board: &Board) -> Result<()> {
        let json = serde_json::to_string_pretty(board)?;
        let tmp = self.tmp_path();

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Saved board ({} bytes) to {}", json.len(), self.path.display());
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
