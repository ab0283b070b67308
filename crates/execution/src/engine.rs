//! The execution engine - dispatches missions and proves their effect.
//!
//! ```text
//! Mark running → Snapshot → Execute → Snapshot → Criterion C → Persist
//! ```

use std::sync::Arc;
use std::time::Duration;
use mission_core::{ExecutionStatus, Mission, MissionId, SessionId};
use mission_quality::{evaluate_criterion_c, final_status, CriterionC};
use mission_tools::{
    Executor, ExecutorError, ExecutorOutcome, ExecutorRequest, Notifier, WorkspaceInspector,
};
use mission_work::{BoardError, BoardService, RunResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::pool::{JobHandle, WorkerPool};
use crate::registry::{Effect, EffectRegistry};

/// Longest executor output kept as the run summary.
const SUMMARY_LIMIT: usize = 2000;

/// Configuration for the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single executor run
    pub executor_timeout_secs: u64,
    /// Max runs executing at once (None = unbounded)
    pub max_concurrent_runs: Option<usize>,
    /// Dispatch new missions whose kind has an effect handler
    pub auto_dispatch: bool,
    /// Channel for failure notifications
    pub notify_channel: String,
    /// Target for failure notifications
    pub notify_target: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor_timeout_secs: 600,
            max_concurrent_runs: None,
            auto_dispatch: true,
            notify_channel: "log".to_string(),
            notify_target: "monarch".to_string(),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Mission run
    pub mission_id: MissionId,
    /// Session of the run
    pub session_id: SessionId,
    /// Final status
    pub status: ExecutionStatus,
    /// Criterion C verdict
    pub criterion: CriterionC,
    /// Evidence produced by this run
    pub evidence: Vec<String>,
    /// Whether the mission was moved to Verification Pending
    pub relocated: bool,
}

/// Acknowledgment of a dispatched run.
#[derive(Debug)]
pub struct RunAccepted {
    /// Always true: the run continues in the background
    pub queued: bool,
    /// Session of the run
    pub session_id: SessionId,
    /// Whether an in-flight run was overridden
    pub overridden: bool,
    /// Handle to await the report
    pub handle: JobHandle<Result<RunReport>>,
}

/// Dispatches missions to an [`Executor`] and records the verified outcome.
#[derive(Clone)]
pub struct ExecutionEngine {
    board: BoardService,
    executor: Arc<dyn Executor>,
    inspector: Arc<dyn WorkspaceInspector>,
    notifier: Option<Arc<dyn Notifier>>,
    effects: EffectRegistry,
    pool: WorkerPool,
    config: EngineConfig,
}

impl ExecutionEngine {
    /// Create a new execution engine.
    pub fn new(
        board: BoardService,
        executor: Arc<dyn Executor>,
        inspector: Arc<dyn WorkspaceInspector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            board,
            executor,
            inspector,
            notifier: None,
            effects: EffectRegistry::default(),
            pool: WorkerPool::new(config.max_concurrent_runs),
            config,
        }
    }

    /// Set the notifier for failed and proof_pending runs.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the effect handlers.
    pub fn with_effects(mut self, effects: EffectRegistry) -> Self {
        self.effects = effects;
        self
    }

    /// Registered effect handlers.
    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Current configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mark the mission running and dispatch it in the background.
    ///
    /// Returns once the running state is persisted. A mission already running
    /// is overridden, not rejected.
    pub async fn run_mission(&self, id: &MissionId) -> Result<RunAccepted> {
        if id.is_empty() {
            return Err(BoardError::Validation("mission id is required".to_string()).into());
        }

        let session = SessionId::new();
        let start = self.board.begin_execution(id, session.clone()).await?;
        info!(
            "Dispatching mission {} via {} (session {})",
            id,
            self.executor.name(),
            session
        );

        let worker = self.clone();
        let mission = start.mission;
        let run_session = session.clone();
        let handle = self
            .pool
            .submit(id.clone(), async move { worker.execute(mission, run_session).await });

        Ok(RunAccepted {
            queued: true,
            session_id: session,
            overridden: start.overridden,
            handle,
        })
    }

    /// Nobody may be awaiting the handle, so a run that cannot be recorded
    /// is logged here.
    async fn execute(self, mission: Mission, session: SessionId) -> Result<RunReport> {
        let id = mission.id.clone();
        let result = self.run_to_completion(mission, session.clone()).await;
        if let Err(e) = &result {
            error!("Run {} for mission {} could not be recorded: {}", session, id, e);
        }
        result
    }

    async fn run_to_completion(&self, mission: Mission, session: SessionId) -> Result<RunReport> {
        let context = context_id(&mission);
        let pre = self.inspector.snapshot(&context).await;
        let outcome = self.invoke(&mission, &session).await;
        let post = self.inspector.snapshot(&context).await;

        let criterion = evaluate_criterion_c(&pre, &post, outcome.success, &outcome.evidence);
        let status = final_status(outcome.success, &criterion);
        debug!(
            "Mission {} criterion C: {} ({})",
            mission.id, criterion.holds, criterion.detail
        );

        let mut evidence = outcome.evidence.clone();
        if criterion.trackable && criterion.holds {
            evidence.extend(post.change_summary.lines().map(|l| l.trim().to_string()));
        }
        if status == ExecutionStatus::ProofPending {
            evidence.push(format!("criterion_c_missing: {}", criterion.detail));
        }

        let completion = self
            .board
            .complete_execution(
                &mission.id,
                RunResult {
                    session_id: session.clone(),
                    status,
                    evidence: evidence.clone(),
                    summary: summarize(&outcome.output_text),
                },
            )
            .await?;

        if matches!(status, ExecutionStatus::Failed | ExecutionStatus::ProofPending) {
            self.notify(&mission, status, &criterion);
        }

        Ok(RunReport {
            mission_id: mission.id,
            session_id: session,
            status,
            criterion,
            evidence,
            relocated: completion.relocated,
        })
    }

    async fn invoke(&self, mission: &Mission, session: &SessionId) -> ExecutorOutcome {
        let executor = match mission.kind.as_deref().and_then(|k| self.effects.get(k)) {
            Some(Effect::Handler(handler)) => {
                debug!("Running effect handler for mission {}", mission.id);
                return handler(mission);
            }
            Some(Effect::Executor(executor)) => {
                debug!("Routing mission {} to {}", mission.id, executor.name());
                executor
            }
            None => self.executor.clone(),
        };

        let timeout = Duration::from_secs(self.config.executor_timeout_secs);
        let request = ExecutorRequest {
            agent_id: mission.agent.clone(),
            session_id: session.to_string(),
            message: mission_message(mission),
            timeout,
        };

        // dropping the run future kills the executor's process
        match tokio::time::timeout(timeout, executor.run(&request)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(ExecutorError::Timeout(limit))) => timed_out(&mission.id, limit),
            Ok(Err(e)) => {
                warn!("Executor failed for mission {}: {}", mission.id, e);
                ExecutorOutcome {
                    success: false,
                    output_text: e.to_string(),
                    evidence: vec![format!("executor error: {}", e)],
                }
            }
            Err(_) => timed_out(&mission.id, timeout),
        }
    }

    fn notify(&self, mission: &Mission, status: ExecutionStatus, criterion: &CriterionC) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let channel = self.config.notify_channel.clone();
        let target = self.config.notify_target.clone();
        let id = mission.id.clone();
        let message = format!(
            "Mission {} ({}) finished as {}: {}",
            mission.id, mission.title, status, criterion.detail
        );

        tokio::spawn(async move {
            if !notifier.send(&channel, &target, &message).await {
                warn!("Notification for mission {} was not delivered", id);
            }
        });
    }
}

fn context_id(mission: &Mission) -> String {
    if mission.agent.trim().is_empty() {
        mission.id.to_string()
    } else {
        mission.agent.clone()
    }
}

fn mission_message(mission: &Mission) -> String {
    let mut message = format!("Mission {}: {}", mission.id, mission.title);
    if !mission.description.trim().is_empty() {
        message.push_str("\n\n");
        message.push_str(mission.description.trim());
    }
    message
}

fn timed_out(id: &MissionId, limit: Duration) -> ExecutorOutcome {
    warn!("Executor timed out for mission {} after {}s", id, limit.as_secs());
    ExecutorOutcome {
        success: false,
        output_text: String::new(),
        evidence: vec![format!("executor timeout after {}s", limit.as_secs())],
    }
}

fn summarize(output: &str) -> Option<String> {
    let output = output.trim();
    if output.is_empty() {
        None
    } else {
        Some(output.chars().take(SUMMARY_LIMIT).collect())
    }
}
