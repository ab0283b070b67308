//! Application configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use mission_execution::{EffectRegistry, EngineConfig, ExecutionEngine, MissionControl};
use mission_storage::JsonBoardStore;
use mission_tools::ToolsConfig;
use mission_work::{BoardConfig, BoardService};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Everything the binary needs to assemble the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Board document path
    pub store_path: PathBuf,
    /// Board service settings
    pub board: BoardConfig,
    /// Execution engine settings
    pub engine: EngineConfig,
    /// Collaborator settings
    pub tools: ToolsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".missions/board.json"),
            board: BoardConfig::default(),
            engine: EngineConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply the `--store` override.
    pub fn with_store(mut self, store: Option<PathBuf>) -> Self {
        if let Some(store) = store {
            self.store_path = store;
        }
        self
    }

    /// Assemble the facade.
    pub async fn build(&self) -> Result<MissionControl> {
        let store = JsonBoardStore::new(&self.store_path)
            .await
            .with_context(|| format!("Failed to open store {}", self.store_path.display()))?;
        let board = BoardService::new(Arc::new(store), self.board.clone());

        let mut effects = EffectRegistry::new();
        for (kind, executor) in self.tools.build_effect_executors() {
            effects.register_executor(&kind, executor);
        }
        if !effects.kinds().is_empty() {
            info!("Effects registered for kinds: {}", effects.kinds().join(", "));
        }

        let engine = ExecutionEngine::new(
            board.clone(),
            self.tools.build_executor(),
            Arc::new(self.tools.build_inspector()),
            self.engine.clone(),
        )
        .with_notifier(self.tools.build_notifier())
        .with_effects(effects);
        Ok(MissionControl::new(board, engine))
    }
}
