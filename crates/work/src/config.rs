//! Board service configuration.

use serde::{Deserialize, Serialize};
use mission_quality::DEFAULT_STUCK_AFTER_MINUTES;
use crate::audit::{DEFAULT_AUDIT_LIMIT, KEY_RETENTION_FACTOR};
use crate::classify::KeywordRule;

/// Board service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Events kept in the audit trail
    pub audit_limit: usize,

    /// Transition keys kept per trail event; 0 keeps all of them.
    /// Replays of a transition whose key was evicted are recorded again.
    pub key_retention_factor: usize,

    /// Minutes after which a running mission is forced to failed
    pub stuck_threshold_minutes: u64,

    /// Telemetry cache lifetime
    pub telemetry_ttl_seconds: u64,

    /// Classifier rules (empty = builtin rules)
    pub classifier_rules: Vec<KeywordRule>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            audit_limit: DEFAULT_AUDIT_LIMIT,
            key_retention_factor: KEY_RETENTION_FACTOR,
            stuck_threshold_minutes: DEFAULT_STUCK_AFTER_MINUTES,
            telemetry_ttl_seconds: 30,
            classifier_rules: Vec::new(),
        }
    }
}
