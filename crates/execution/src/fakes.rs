//! Scripted collaborators for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use mission_storage::MemoryBoardStore;
use mission_tools::{
    Executor, ExecutorError, ExecutorOutcome, ExecutorRequest, Notifier, WorkspaceInspector,
    WorkspaceSnapshot,
};
use mission_work::{BoardConfig, BoardService};
use tokio::sync::{mpsc, Semaphore};

use crate::engine::{EngineConfig, ExecutionEngine};

pub struct ScriptedExecutor {
    outcome: ExecutorOutcome,
    gate: Option<Semaphore>,
    stall: bool,
    requests: Mutex<Vec<ExecutorRequest>>,
}

impl ScriptedExecutor {
    pub fn new(outcome: ExecutorOutcome) -> Self {
        Self {
            outcome,
            gate: None,
            stall: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Each run waits for a permit from [`release`](Self::release).
    pub fn gated(outcome: ExecutorOutcome) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(outcome)
        }
    }

    /// Never returns.
    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::new(ExecutorOutcome::default())
        }
    }

    pub fn release(&self, runs: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(runs);
        }
    }

    pub fn requests(&self) -> Vec<ExecutorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, request: &ExecutorRequest) -> Result<ExecutorOutcome, ExecutorError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.stall {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        Ok(self.outcome.clone())
    }
}

pub struct ScriptedInspector {
    snapshots: Mutex<VecDeque<WorkspaceSnapshot>>,
}

impl ScriptedInspector {
    /// Returns `snapshots` in order, then untracked ones.
    pub fn new(snapshots: Vec<WorkspaceSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }

    pub fn untracked() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl WorkspaceInspector for ScriptedInspector {
    async fn snapshot(&self, _context_id: &str) -> WorkspaceSnapshot {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(WorkspaceSnapshot::untracked)
    }
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<String>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Next delivered message, waiting up to two seconds.
    pub async fn next(&self) -> Option<String> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, _channel: &str, _target: &str, message: &str) -> bool {
        self.tx.send(message.to_string()).is_ok()
    }
}

pub struct Rig {
    pub store: Arc<MemoryBoardStore>,
    pub board: BoardService,
    pub engine: ExecutionEngine,
    pub executor: Arc<ScriptedExecutor>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Rig {
    pub fn new(executor: ScriptedExecutor, inspector: ScriptedInspector) -> Self {
        Self::with_config(executor, inspector, EngineConfig::default())
    }

    pub fn with_config(
        executor: ScriptedExecutor,
        inspector: ScriptedInspector,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(MemoryBoardStore::new());
        let board = BoardService::new(store.clone(), BoardConfig::default());
        let executor = Arc::new(executor);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ExecutionEngine::new(
            board.clone(),
            executor.clone(),
            Arc::new(inspector),
            config,
        )
        .with_notifier(notifier.clone());

        Self {
            store,
            board,
            engine,
            executor,
            notifier,
        }
    }
}
