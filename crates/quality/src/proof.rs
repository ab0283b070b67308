//! Proof of execution and criterion C.

use mission_core::{ExecutionStatus, Mission, Time};
use mission_tools::WorkspaceSnapshot;
use serde::{Deserialize, Serialize};

/// Whether a mission carries proof of execution: an effective run with at
/// least one evidence entry. This is the only predicate gating Done.
pub fn has_execution_proof(mission: &Mission) -> bool {
    mission.execution.status == ExecutionStatus::Effective && mission.execution.has_evidence()
}

/// Proof state reported to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSummary {
    /// Execution status
    pub status: ExecutionStatus,
    /// Whether the mission carries proof
    pub effective: bool,
    /// Number of evidence entries
    pub evidence_count: usize,
    /// Most recent evidence entry
    pub latest_evidence: Option<String>,
    /// Session of the last run
    pub session_id: Option<String>,
    /// When the last run started
    pub started_at: Option<Time>,
    /// When the last run ended
    pub ended_at: Option<Time>,
}

impl ProofSummary {
    /// Summarize a mission's proof state.
    pub fn of(mission: &Mission) -> Self {
        let execution = &mission.execution;
        Self {
            status: execution.status,
            effective: has_execution_proof(mission),
            evidence_count: execution.evidence.len(),
            latest_evidence: execution.evidence.last().cloned(),
            session_id: execution.session_id.as_ref().map(|s| s.to_string()),
            started_at: execution.started_at,
            ended_at: execution.ended_at,
        }
    }
}

/// Result of the verifiable-change check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionC {
    /// Whether the check holds
    pub holds: bool,
    /// Whether it was decided on tracked workspace state
    pub trackable: bool,
    /// Short explanation
    pub detail: String,
}

/// Evaluate criterion C.
///
/// With a trackable context both snapshots must be trackable; C holds when
/// the signature changed and a change summary exists. Otherwise C falls back
/// to the executor's own report: success with non-empty evidence.
pub fn evaluate_criterion_c(
    pre: &WorkspaceSnapshot,
    post: &WorkspaceSnapshot,
    executor_success: bool,
    executor_evidence: &[String],
) -> CriterionC {
    if pre.trackable && post.trackable {
        let changed = pre.change_signature != post.change_signature;
        let summarized = !post.change_summary.trim().is_empty();
        let detail = match (changed, summarized) {
            (true, true) => "workspace changed".to_string(),
            (true, false) => "workspace signature changed but no pending change".to_string(),
            (false, _) => "workspace unchanged".to_string(),
        };
        return CriterionC {
            holds: changed && summarized,
            trackable: true,
            detail,
        };
    }

    let has_evidence = executor_evidence.iter().any(|e| !e.trim().is_empty());
    CriterionC {
        holds: executor_success && has_evidence,
        trackable: false,
        detail: if has_evidence {
            "executor evidence (untracked context)".to_string()
        } else {
            "no executor evidence (untracked context)".to_string()
        },
    }
}

/// Final run status: effective when the executor succeeded and C holds,
/// proof_pending when only C failed, failed otherwise.
pub fn final_status(executor_success: bool, criterion: &CriterionC) -> ExecutionStatus {
    match (executor_success, criterion.holds) {
        (true, true) => ExecutionStatus::Effective,
        (true, false) => ExecutionStatus::ProofPending,
        (false, _) => ExecutionStatus::Failed,
    }
}
