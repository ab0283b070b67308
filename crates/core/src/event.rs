//! Transition event - atoms of the audit trail.

use crate::id::{EventId, MissionId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A recorded move of a mission between stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    /// Unique identifier
    pub id: EventId,

    /// Mission that moved
    pub mission_id: MissionId,

    /// Source stage (empty for creation)
    pub from: String,

    /// Target stage
    pub to: String,

    /// Who performed the move
    pub actor: String,

    /// Why
    pub reason: String,

    /// When it happened
    pub timestamp: Time,

    /// Mission title at the time of the move
    pub title: String,
}

impl TransitionEvent {
    /// Create a new event stamped now.
    pub fn new(
        mission_id: MissionId,
        from: impl Into<String>,
        to: impl Into<String>,
        actor: impl Into<String>,
        reason: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            mission_id,
            from: from.into(),
            to: to.into(),
            actor: actor.into(),
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
            title: title.into(),
        }
    }
}

/// Well-known actor names.
pub mod actors {
    /// Board operations performed by the system itself
    pub const SYSTEM: &str = "system";
    /// The execution engine
    pub const ENGINE: &str = "execution-engine";
    /// The stuck-run watchdog
    pub const WATCHDOG: &str = "watchdog";
    /// A client posting its board layout
    pub const CLIENT: &str = "client";
}
