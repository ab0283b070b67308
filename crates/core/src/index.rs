//! Mission index: id assignment, duplicate removal, and merging client layouts.

use std::collections::{BTreeMap, HashSet};
use crate::board::{Board, Column};
use crate::id::MissionId;
use crate::mission::Mission;

/// Outcome of an index rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRebuild {
    /// The id -> id map now stored on the board
    pub index: BTreeMap<MissionId, MissionId>,

    /// Ids generated for missions that had none
    pub assigned: Vec<MissionId>,

    /// Ids of duplicate entries that were removed
    pub dropped: Vec<MissionId>,
}

impl IndexRebuild {
    /// Whether the rebuild changed the columns.
    pub fn changed_columns(&self) -> bool {
        !self.assigned.is_empty() || !self.dropped.is_empty()
    }
}

/// Rebuild the mission index.
///
/// Missions without an id get a fresh one. When an id appears more than once,
/// the first occurrence in column-then-item order is kept and later ones are
/// removed from the board.
pub fn rebuild_index(board: &mut Board) -> IndexRebuild {
    let mut seen = HashSet::new();
    let mut rebuild = IndexRebuild::default();

    for column in &mut board.columns {
        column.items.retain_mut(|mission| {
            if mission.id.is_empty() {
                mission.id = MissionId::generate();
                rebuild.assigned.push(mission.id.clone());
            }
            if seen.insert(mission.id.clone()) {
                true
            } else {
                rebuild.dropped.push(mission.id.clone());
                false
            }
        });
    }

    rebuild.index = seen.into_iter().map(|id| (id.clone(), id)).collect();
    board.mission_index = rebuild.index.clone();
    rebuild
}

/// Merge a client-supplied column layout with the canonical board.
///
/// For every incoming mission that shares an id with a canonical one, the
/// protected fields (identity, title, description, kind, execution record,
/// creation time) come from canonical; everything else keeps the incoming
/// value. Incoming missions unknown to canonical are returned as-is.
pub fn merge_incoming(canonical: &Board, incoming: Vec<Column>) -> Vec<Column> {
    incoming
        .into_iter()
        .map(|mut column| {
            for mission in &mut column.items {
                if mission.id.is_empty() {
                    continue;
                }
                if let Some(existing) = canonical.mission(&mission.id) {
                    protect_fields(mission, existing);
                }
            }
            column
        })
        .collect()
}

fn protect_fields(incoming: &mut Mission, canonical: &Mission) {
    incoming.id = canonical.id.clone();
    incoming.title = canonical.title.clone();
    incoming.description = canonical.description.clone();
    incoming.kind = canonical.kind.clone();
    incoming.execution = canonical.execution.clone();
    incoming.created_at = canonical.created_at;
}
