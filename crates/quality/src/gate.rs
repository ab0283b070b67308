//! The Done gate.

use mission_core::{stages, Mission};
use serde::{Deserialize, Serialize};
use crate::proof::has_execution_proof;

/// Why a move into Done was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GuardRejection {
    /// Execution status is not effective or evidence is empty
    #[error("Done requires execution proof: an effective run with evidence")]
    DoneRequiresProof,

    /// Risk level >= 1 without approval
    #[error("Done requires approval for missions with risk level 1 or higher")]
    DoneRequiresApproval,

    /// Risk level >= 2 without monarch approval
    #[error("Done requires monarch approval for missions with risk level 2")]
    DoneRequiresMonarchApproval,
}

impl GuardRejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DoneRequiresProof => "done_requires_proof",
            Self::DoneRequiresApproval => "done_requires_approval",
            Self::DoneRequiresMonarchApproval => "done_requires_monarch_approval",
        }
    }
}

/// Check whether `mission` may enter Done.
///
/// Checks run in a fixed order (proof, approval, monarch approval) and the
/// first failure wins.
pub fn check_done(mission: &Mission) -> Result<(), GuardRejection> {
    if !has_execution_proof(mission) {
        return Err(GuardRejection::DoneRequiresProof);
    }
    if mission.risk_level >= 1 && !mission.approved {
        return Err(GuardRejection::DoneRequiresApproval);
    }
    if mission.risk_level >= 2 && !mission.monarch_approved {
        return Err(GuardRejection::DoneRequiresMonarchApproval);
    }
    Ok(())
}

/// Validate moving `mission` into the stage `to`. Only Done is gated.
pub fn validate_move(mission: &Mission, to: &str) -> Result<(), GuardRejection> {
    if stages::is_done(to) {
        check_done(mission)
    } else {
        Ok(())
    }
}
