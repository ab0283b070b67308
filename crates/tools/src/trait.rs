//! Collaborator abstractions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Executes a mission on behalf of an agent.
///
/// Implementations must stop the underlying work when the returned future is
/// dropped; that is how callers enforce timeouts.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executor name (for logs).
    fn name(&self) -> &str;

    /// Run a mission message in an agent's session.
    async fn run(&self, request: &ExecutorRequest) -> Result<ExecutorOutcome, ExecutorError>;
}

/// Inspects the change state of an agent's execution context.
#[async_trait]
pub trait WorkspaceInspector: Send + Sync {
    /// Snapshot the change state of `context_id`.
    async fn snapshot(&self, context_id: &str) -> WorkspaceSnapshot;
}

/// Best-effort outbound notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to `target` over `channel`. Returns whether delivery
    /// was accepted.
    async fn send(&self, channel: &str, target: &str, message: &str) -> bool;
}

/// Input to an executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorRequest {
    /// Agent the mission belongs to
    pub agent_id: String,

    /// Session of this run
    pub session_id: String,

    /// Message describing the mission
    pub message: String,

    /// Upper bound on the run
    pub timeout: Duration,
}

/// Output from an executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutcome {
    /// Whether the executor reported success
    pub success: bool,

    /// Free-form output
    pub output_text: String,

    /// Evidence entries reported by the executor
    pub evidence: Vec<String>,
}

/// Errors raised while executing.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The process could not be started
    #[error("failed to spawn executor: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O while talking to the process
    #[error("executor I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run exceeded its timeout and was killed
    #[error("executor timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Change state of an execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    /// Whether the context supports change tracking
    pub trackable: bool,

    /// Opaque signature; differs whenever tracked state differs
    pub change_signature: String,

    /// Human readable list of pending changes
    pub change_summary: String,
}

impl WorkspaceSnapshot {
    /// Snapshot of a context that cannot be tracked.
    pub fn untracked() -> Self {
        Self::default()
    }
}
