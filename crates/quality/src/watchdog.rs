//! Stuck-run recovery.

use chrono::Duration;
use mission_core::{Board, ExecutionStatus, Mission, MissionId, Time};
use tracing::warn;

/// Default age after which a running mission is considered stuck.
pub const DEFAULT_STUCK_AFTER_MINUTES: u64 = 12;

/// Forces missions stuck in `running` to `failed`.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    stuck_after: Duration,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_STUCK_AFTER_MINUTES)
    }
}

impl Watchdog {
    /// Create a watchdog with a custom threshold.
    pub fn new(stuck_after: Duration) -> Self {
        Self { stuck_after }
    }

    /// Create a watchdog with a threshold in minutes.
    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::minutes(minutes as i64))
    }

    /// The stuck threshold.
    pub fn stuck_after(&self) -> Duration {
        self.stuck_after
    }

    /// Whether a mission is running and past the threshold at `now`.
    ///
    /// A running mission without `started_at` counts as stuck.
    pub fn is_stuck(&self, mission: &Mission, now: Time) -> bool {
        if mission.execution.status != ExecutionStatus::Running {
            return false;
        }
        match mission.execution.started_at {
            Some(started_at) => now - started_at > self.stuck_after,
            None => true,
        }
    }

    /// Force every stuck mission to `failed`. Returns the ids touched.
    pub fn sweep(&self, board: &mut Board, now: Time) -> Vec<MissionId> {
        let mut forced = Vec::new();
        for mission in board.missions_mut() {
            if !self.is_stuck(mission, now) {
                continue;
            }

            let since = mission
                .execution
                .started_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            warn!(
                "Watchdog forcing mission {} to failed (running since {})",
                mission.id, since
            );

            let execution = &mut mission.execution;
            execution.status = ExecutionStatus::Failed;
            execution.ended_at = Some(now);
            execution.updated_at = Some(now);
            execution.merge_evidence([format!(
                "watchdog: forced failed after timeout (running since {})",
                since
            )]);
            mission.updated_at = Some(now);
            forced.push(mission.id.clone());
        }
        forced
    }
}
