//! Cached board summary with an explicit timestamp and TTL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::board::Board;
use crate::mission::Mission;
use crate::Time;

/// Summary of the board, stored on the board itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySummary {
    /// When the summary was computed
    pub computed_at: Time,

    /// How long the summary stays fresh
    pub ttl_seconds: u64,

    /// Total missions on the board
    pub total: usize,

    /// Mission count per column
    pub by_column: BTreeMap<String, usize>,

    /// Mission count per execution status
    pub by_status: BTreeMap<String, usize>,

    /// Missions carrying execution proof
    pub proven: usize,
}

impl TelemetrySummary {
    /// Compute a summary of `board`. `is_proven` decides which missions count
    /// as carrying proof.
    pub fn compute(board: &Board, ttl_seconds: u64, is_proven: impl Fn(&Mission) -> bool) -> Self {
        let mut by_column = BTreeMap::new();
        for column in &board.columns {
            by_column.insert(column.name.clone(), column.items.len());
        }

        let mut by_status = BTreeMap::new();
        let mut total = 0;
        let mut proven = 0;
        for (_, mission) in board.missions() {
            total += 1;
            *by_status
                .entry(mission.execution.status.as_str().to_string())
                .or_insert(0) += 1;
            if is_proven(mission) {
                proven += 1;
            }
        }

        Self {
            computed_at: chrono::Utc::now(),
            ttl_seconds,
            total,
            by_column,
            by_status,
            proven,
        }
    }

    /// Whether the summary is still fresh at `now`.
    pub fn is_fresh(&self, now: Time) -> bool {
        let ttl = chrono::Duration::seconds(self.ttl_seconds.min(u32::MAX as u64) as i64);
        now < self.computed_at + ttl
    }
}
