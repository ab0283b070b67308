//! Audit trail: idempotent, content-deduplicated transition log.

use mission_core::{actors, Board, MissionId, TransitionEvent};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Default number of events kept in the trail.
pub const DEFAULT_AUDIT_LIMIT: usize = 5000;

/// Default multiple of the trail limit kept in the dedup key set.
///
/// An evicted key no longer deduplicates: replaying that exact transition
/// afterwards records it again. Raise the factor (or set it to 0 to keep
/// every key) when clients may retry long after the fact.
pub const KEY_RETENTION_FACTOR: usize = 4;

/// A transition about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Mission that moved
    pub mission_id: MissionId,
    /// Source stage
    pub from: String,
    /// Target stage
    pub to: String,
    /// Who moved it
    pub actor: String,
    /// Why
    pub reason: String,
    /// Mission title
    pub title: String,
    /// Caller-supplied idempotency key
    pub transition_id: Option<String>,
}

impl Transition {
    /// Create a transition by the system actor with no reason.
    pub fn new(mission_id: MissionId, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            mission_id,
            from: from.into(),
            to: to.into(),
            actor: actors::SYSTEM.to_string(),
            reason: String::new(),
            title: String::new(),
            transition_id: None,
        }
    }

    /// Set the actor.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set an explicit idempotency key. Blank keys are ignored.
    pub fn with_transition_id(mut self, transition_id: Option<String>) -> Self {
        self.transition_id = transition_id.filter(|t| !t.trim().is_empty());
        self
    }

    /// Dedup key: the explicit transition id, else the content digest.
    pub fn key(&self) -> String {
        match &self.transition_id {
            Some(id) => id.clone(),
            None => transition_key(
                &self.mission_id,
                &self.from,
                &self.to,
                &self.actor,
                &self.reason,
            ),
        }
    }
}

/// Hex SHA-256 over the lower-cased `missionId|from|to|actor|reason`.
pub fn transition_key(
    mission_id: &MissionId,
    from: &str,
    to: &str,
    actor: &str,
    reason: &str,
) -> String {
    let material = format!("{}|{}|{}|{}|{}", mission_id, from, to, actor, reason).to_lowercase();
    hex::encode(Sha256::digest(material.as_bytes()))
}

/// Append a transition unless its key was already recorded.
///
/// Returns `false` for an idempotent no-op. The trail is truncated to the most
/// recent `limit` events and the key set to `limit * KEY_RETENTION_FACTOR`
/// entries, oldest first.
pub fn record_transition(board: &mut Board, transition: Transition, limit: usize) -> bool {
    record_transition_with(board, transition, limit, KEY_RETENTION_FACTOR)
}

/// [`record_transition`] with an explicit key retention factor.
///
/// The key set keeps `limit * key_retention` entries; 0 keeps every key, so
/// the set grows with the board's whole history.
pub fn record_transition_with(
    board: &mut Board,
    transition: Transition,
    limit: usize,
    key_retention: usize,
) -> bool {
    let key = transition.key();
    if board.transition_keys.contains_key(&key) {
        debug!(
            "Transition {} -> {} for mission {} already recorded",
            transition.from, transition.to, transition.mission_id
        );
        return false;
    }

    let event = TransitionEvent::new(
        transition.mission_id,
        transition.from,
        transition.to,
        transition.actor,
        transition.reason,
        transition.title,
    );
    board.transition_keys.insert(key, event.timestamp);
    board.audit_trail.push(event);

    let limit = limit.max(1);
    if board.audit_trail.len() > limit {
        let excess = board.audit_trail.len() - limit;
        board.audit_trail.drain(..excess);
    }
    if key_retention > 0 {
        evict_keys(board, limit.saturating_mul(key_retention));
    }
    true
}

fn evict_keys(board: &mut Board, max_keys: usize) {
    if board.transition_keys.len() <= max_keys {
        return;
    }
    let mut by_age: Vec<_> = board
        .transition_keys
        .iter()
        .map(|(key, at)| (*at, key.clone()))
        .collect();
    by_age.sort();
    let excess = by_age.len() - max_keys;
    for (_, key) in by_age.into_iter().take(excess) {
        board.transition_keys.remove(&key);
    }
}

/// All events for a mission, ascending by timestamp.
pub fn timeline(board: &Board, mission_id: &MissionId) -> Vec<TransitionEvent> {
    let mut events: Vec<_> = board
        .audit_trail
        .iter()
        .filter(|e| &e.mission_id == mission_id)
        .cloned()
        .collect();
    // stable: equal timestamps keep trail order
    events.sort_by_key(|e| e.timestamp);
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(from: &str, to: &str) -> Transition {
        Transition::new(MissionId::new("m1"), from, to)
            .with_actor("client")
            .with_reason("triage")
    }

    #[test]
    fn test_key_is_case_insensitive_digest() {
        let a = transition_key(&"M1".into(), "Inbox", "Review", "Client", "Triage");
        let b = transition_key(&"m1".into(), "inbox", "review", "client", "triage");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, transition_key(&"m1".into(), "inbox", "done", "client", "triage"));
    }

    #[test]
    fn test_identical_transition_recorded_once() {
        let mut board = Board::skeleton();
        assert!(record_transition(&mut board, moved("Inbox", "Review"), 10));
        assert!(!record_transition(&mut board, moved("Inbox", "Review"), 10));
        assert_eq!(board.audit_trail.len(), 1);
        assert_eq!(board.transition_keys.len(), 1);
    }

    #[test]
    fn test_explicit_transition_id_wins() {
        let mut board = Board::skeleton();
        let first = moved("Inbox", "Review").with_transition_id(Some("t-1".into()));
        let other = moved("Review", "Rework").with_transition_id(Some("t-1".into()));
        assert!(record_transition(&mut board, first, 10));
        assert!(!record_transition(&mut board, other, 10));

        let blank = moved("Inbox", "Review").with_transition_id(Some("  ".into()));
        assert!(blank.transition_id.is_none());
        assert!(record_transition(&mut board, blank, 10));
        assert_eq!(board.audit_trail.len(), 2);
    }

    #[test]
    fn test_trail_and_keys_bounded() {
        let mut board = Board::skeleton();
        for i in 0..20 {
            let t = moved("Inbox", "Review").with_reason(format!("pass {}", i));
            assert!(record_transition(&mut board, t, 3));
        }
        assert_eq!(board.audit_trail.len(), 3);
        assert_eq!(board.audit_trail[2].reason, "pass 19");
        assert_eq!(board.transition_keys.len(), 3 * KEY_RETENTION_FACTOR);
    }

    #[test]
    fn test_evicted_key_no_longer_dedups() {
        let mut board = Board::skeleton();
        assert!(record_transition_with(&mut board, moved("Inbox", "Review"), 1, 1));
        for at in board.transition_keys.values_mut() {
            *at -= chrono::Duration::seconds(10);
        }
        assert!(record_transition_with(&mut board, moved("Review", "Rework"), 1, 1));
        assert_eq!(board.transition_keys.len(), 1);
        assert!(record_transition_with(&mut board, moved("Inbox", "Review"), 1, 1));
    }

    #[test]
    fn test_zero_retention_keeps_every_key() {
        let mut board = Board::skeleton();
        assert!(record_transition_with(&mut board, moved("Inbox", "Review"), 2, 0));
        for i in 0..30 {
            let t = moved("Review", "Rework").with_reason(format!("pass {}", i));
            assert!(record_transition_with(&mut board, t, 2, 0));
        }
        assert_eq!(board.audit_trail.len(), 2);
        assert_eq!(board.transition_keys.len(), 31);
        assert!(!record_transition_with(&mut board, moved("Inbox", "Review"), 2, 0));
    }

    #[test]
    fn test_timeline_filters_and_sorts() {
        let mut board = Board::skeleton();
        record_transition(&mut board, moved("", "Inbox"), 10);
        record_transition(
            &mut board,
            Transition::new(MissionId::new("m2"), "", "Inbox"),
            10,
        );
        record_transition(&mut board, moved("Inbox", "Review"), 10);

        // older event appended last
        let mut late = TransitionEvent::new("m1".into(), "x", "y", "a", "r", "t");
        late.timestamp = board.audit_trail[0].timestamp - chrono::Duration::seconds(5);
        board.audit_trail.push(late);

        let events = timeline(&board, &MissionId::new("m1"));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].from, "x");
        assert_eq!(events[1].to, "Inbox");
        assert_eq!(events[2].to, "Review");
    }
}
