//! Mission model - the unit of work tracked through the pipeline.

use serde::{Deserialize, Serialize};
use crate::id::{MissionId, SessionId};
use crate::Time;

/// A mission is a unit of work that moves between board columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mission {
    /// Unique identifier (empty until the index assigns one)
    #[serde(deserialize_with = "crate::lenient::text")]
    pub id: MissionId,

    /// Mission title
    #[serde(deserialize_with = "crate::lenient::text")]
    pub title: String,

    /// Detailed description
    #[serde(deserialize_with = "crate::lenient::text")]
    pub description: String,

    /// Owning agent; selects the execution context
    #[serde(deserialize_with = "crate::lenient::text")]
    pub agent: String,

    /// Classification tag selecting an automated effect
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub kind: Option<String>,

    /// Risk level: 0 (none), 1 (needs approval), 2 (needs monarch approval too)
    #[serde(deserialize_with = "crate::lenient::risk_level")]
    pub risk_level: u8,

    /// Approval flag required for risk level >= 1
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub approved: bool,

    /// Monarch approval flag required for risk level >= 2
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub monarch_approved: bool,

    /// Latest execution attempt
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub execution: ExecutionRecord,

    /// Free-text note describing what the user still has to do
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub needs_user_action: Option<String>,

    /// Creation timestamp
    #[serde(deserialize_with = "crate::lenient::time_or_now")]
    pub created_at: Time,

    /// Last update timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub updated_at: Option<Time>,

    /// Client-supplied fields this model does not know about
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            id: MissionId::default(),
            title: String::new(),
            description: String::new(),
            agent: String::new(),
            kind: None,
            risk_level: 0,
            approved: false,
            monarch_approved: false,
            execution: ExecutionRecord::default(),
            needs_user_action: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl Mission {
    /// Create a new mission with a generated id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: MissionId::generate(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<MissionId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the owning agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Set the risk level.
    pub fn with_risk_level(mut self, risk_level: u8) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Stamp `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Some(chrono::Utc::now());
    }
}

/// Tracks one attempt to carry out a mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Session of the current (or last) run
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub session_id: Option<SessionId>,

    /// Agent the run was dispatched to
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub agent: Option<String>,

    /// When the run started
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub started_at: Option<Time>,

    /// When the run ended
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub ended_at: Option<Time>,

    /// Last time the record changed
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub updated_at: Option<Time>,

    /// Current status
    #[serde(deserialize_with = "crate::lenient::status")]
    pub status: ExecutionStatus,

    /// Evidence entries, insertion ordered and de-duplicated
    #[serde(deserialize_with = "crate::lenient::strings")]
    pub evidence: Vec<String>,

    /// Truncated executor output
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub summary: Option<String>,
}

impl ExecutionRecord {
    /// Merge evidence entries, keeping insertion order and skipping blanks and
    /// duplicates. Returns how many entries were added.
    pub fn merge_evidence<I, S>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for entry in entries {
            let entry = entry.into();
            let entry = entry.trim();
            if entry.is_empty() || self.evidence.iter().any(|e| e == entry) {
                continue;
            }
            self.evidence.push(entry.to_string());
            added += 1;
        }
        added
    }

    /// Whether any evidence has been collected.
    pub fn has_evidence(&self) -> bool {
        !self.evidence.is_empty()
    }
}

/// Execution status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Never dispatched
    #[default]
    Pending,
    /// Dispatched, waiting on the executor
    Running,
    /// Executor succeeded and the change was verified
    Effective,
    /// Executor failed, timed out, or was reclaimed by the watchdog
    Failed,
    /// Executor succeeded but no verifiable change was observed
    ProofPending,
}

impl ExecutionStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [ExecutionStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Effective,
        Self::Failed,
        Self::ProofPending,
    ];

    /// Whether a run has finished in this status.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Effective | Self::Failed | Self::ProofPending)
    }

    /// Whether `next` is a legal advance from this status.
    ///
    /// pending -> running -> {effective, failed, proof_pending}; a running
    /// mission may be re-dispatched (override) and a finished one retried.
    pub fn can_advance_to(self, next: ExecutionStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running) => true,
            (Self::Running, _) => next != Self::Pending,
            (finished, Self::Running) if finished.is_finished() => true,
            _ => false,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Effective => "effective",
            Self::Failed => "failed",
            Self::ProofPending => "proof_pending",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an execution status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown execution status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for ExecutionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_evidence_dedups_in_order() {
        let mut record = ExecutionRecord::default();
        let added = record.merge_evidence(["a", "b", "a", "  ", "c"]);
        assert_eq!(added, 3);
        assert_eq!(record.evidence, vec!["a", "b", "c"]);

        let added = record.merge_evidence(vec!["c".to_string(), "d".to_string()]);
        assert_eq!(added, 1);
        assert_eq!(record.evidence, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_status_advances() {
        use ExecutionStatus::*;
        assert!(Pending.can_advance_to(Running));
        assert!(!Pending.can_advance_to(Effective));
        assert!(Running.can_advance_to(Effective));
        assert!(Running.can_advance_to(ProofPending));
        assert!(Running.can_advance_to(Failed));
        assert!(!Running.can_advance_to(Pending));
        assert!(Failed.can_advance_to(Running));
        assert!(!Failed.can_advance_to(Effective));
        assert!(!Effective.can_advance_to(Pending));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("proof-pending".parse::<ExecutionStatus>(), Ok(ExecutionStatus::ProofPending));
        assert_eq!("Effective".parse::<ExecutionStatus>(), Ok(ExecutionStatus::Effective));
        assert!("done".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_mission_json_uses_camel_case_and_keeps_unknown_fields() {
        let json = serde_json::json!({
            "id": "m1",
            "title": "Fix header",
            "riskLevel": 2,
            "monarchApproved": true,
            "execution": { "status": "proof_pending", "evidence": ["x"] },
            "color": "red"
        });
        let mission: Mission = serde_json::from_value(json).unwrap();
        assert_eq!(mission.id.as_str(), "m1");
        assert_eq!(mission.risk_level, 2);
        assert!(mission.monarch_approved);
        assert_eq!(mission.execution.status, ExecutionStatus::ProofPending);
        assert_eq!(mission.extra.get("color"), Some(&serde_json::json!("red")));

        let back = serde_json::to_value(&mission).unwrap();
        assert_eq!(back["riskLevel"], 2);
        assert_eq!(back["color"], "red");
    }
}
