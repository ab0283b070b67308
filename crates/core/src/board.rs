//! Board model - the whole pipeline snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::cache::TelemetrySummary;
use crate::event::TransitionEvent;
use crate::id::MissionId;
use crate::mission::Mission;
use crate::Time;

/// Stage names with fixed semantics.
pub mod stages {
    /// Ingress column for new missions
    pub const INBOX: &str = "Inbox";
    /// Missions assigned to an agent
    pub const ASSIGNED: &str = "Assigned";
    /// Missions being worked on
    pub const IN_PROGRESS: &str = "In Progress";
    /// Missions awaiting review
    pub const REVIEW: &str = "Review";
    /// Runs that succeeded without a verifiable change
    pub const VERIFICATION_PENDING: &str = "Verification Pending";
    /// Missions sent back for another run
    pub const REWORK: &str = "Rework";
    /// Gated terminal column
    pub const DONE: &str = "Done";

    /// Default column layout, in board order.
    pub const DEFAULT: [&str; 7] = [
        INBOX,
        ASSIGNED,
        IN_PROGRESS,
        REVIEW,
        VERIFICATION_PENDING,
        REWORK,
        DONE,
    ];

    /// Case-insensitive stage comparison.
    pub fn same(a: &str, b: &str) -> bool {
        a.trim().eq_ignore_ascii_case(b.trim())
    }

    /// Whether `name` is the gated terminal stage.
    pub fn is_done(name: &str) -> bool {
        same(name, DONE)
    }

    /// Canonical spelling of a fixed stage, if `name` is one.
    pub fn fixed(name: &str) -> Option<&'static str> {
        DEFAULT.into_iter().find(|stage| same(stage, name))
    }
}

/// A pipeline stage holding an ordered list of missions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Column {
    /// Stage name
    #[serde(deserialize_with = "crate::lenient::text")]
    pub name: String,

    /// Missions, head first
    #[serde(deserialize_with = "crate::lenient::skip_invalid")]
    pub items: Vec<Mission>,
}

impl Column {
    /// Create an empty column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }
}

/// The whole board document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Board {
    /// Columns in board order
    #[serde(deserialize_with = "crate::lenient::skip_invalid")]
    pub columns: Vec<Column>,

    /// Mission id index (id -> id)
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub mission_index: BTreeMap<MissionId, MissionId>,

    /// Transition dedup keys (digest or explicit id -> when recorded)
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub transition_keys: BTreeMap<String, Time>,

    /// Most recent transitions, oldest first
    #[serde(deserialize_with = "crate::lenient::skip_invalid")]
    pub audit_trail: Vec<TransitionEvent>,

    /// Cached board summary
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(deserialize_with = "crate::lenient::or_default")]
    pub telemetry: Option<TelemetrySummary>,

    /// Document sections owned by other collaborators
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Where a mission sits on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Column index
    pub column: usize,
    /// Item index within the column
    pub item: usize,
}

impl Board {
    /// Fresh board with the default column layout.
    pub fn skeleton() -> Self {
        Self {
            columns: stages::DEFAULT.iter().map(|name| Column::new(*name)).collect(),
            ..Default::default()
        }
    }

    /// Find a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| stages::same(&c.name, name))
    }

    /// Index of a column by name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| stages::same(&c.name, name))
    }

    /// Resolve a target column, creating fixed stages on demand.
    ///
    /// Returns `None` for an unknown, non-fixed stage.
    pub fn resolve_column(&mut self, name: &str) -> Option<usize> {
        if let Some(idx) = self.column_index(name) {
            return Some(idx);
        }
        let fixed = stages::fixed(name)?;
        if stages::same(fixed, stages::INBOX) {
            self.columns.insert(0, Column::new(fixed));
            Some(0)
        } else {
            self.columns.push(Column::new(fixed));
            Some(self.columns.len() - 1)
        }
    }

    /// Locate a mission by id.
    pub fn locate(&self, id: &MissionId) -> Option<Location> {
        self.columns.iter().enumerate().find_map(|(column, c)| {
            c.items
                .iter()
                .position(|m| &m.id == id)
                .map(|item| Location { column, item })
        })
    }

    /// Name of the column holding a mission.
    pub fn column_of(&self, id: &MissionId) -> Option<&str> {
        self.locate(id).map(|loc| self.columns[loc.column].name.as_str())
    }

    /// Borrow a mission by id.
    pub fn mission(&self, id: &MissionId) -> Option<&Mission> {
        self.locate(id)
            .map(|loc| &self.columns[loc.column].items[loc.item])
    }

    /// Mutably borrow a mission by id.
    pub fn mission_mut(&mut self, id: &MissionId) -> Option<&mut Mission> {
        let loc = self.locate(id)?;
        Some(&mut self.columns[loc.column].items[loc.item])
    }

    /// Remove a mission from its column, returning the column name and mission.
    pub fn take_mission(&mut self, id: &MissionId) -> Option<(String, Mission)> {
        let loc = self.locate(id)?;
        let column = &mut self.columns[loc.column];
        let mission = column.items.remove(loc.item);
        Some((column.name.clone(), mission))
    }

    /// Insert a mission at the head of a column.
    pub fn insert_front(&mut self, column: usize, mission: Mission) {
        self.columns[column].items.insert(0, mission);
    }

    /// Iterate every mission with its column name.
    pub fn missions(&self) -> impl Iterator<Item = (&str, &Mission)> {
        self.columns
            .iter()
            .flat_map(|c| c.items.iter().map(move |m| (c.name.as_str(), m)))
    }

    /// Mutably iterate every mission.
    pub fn missions_mut(&mut self) -> impl Iterator<Item = &mut Mission> {
        self.columns.iter_mut().flat_map(|c| c.items.iter_mut())
    }
}
