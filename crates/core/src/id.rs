//! Unique identifiers for board entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a Mission.
///
/// Mission ids are free-form strings: clients may pick their own (`"m1"`),
/// and the index assigns a generated one to any mission stored without it.
/// The empty string means "no id yet". Decoding trims like [`MissionId::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MissionId(String);

impl MissionId {
    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Generate a fresh unique id.
    pub fn generate() -> Self {
        Self(format!("m_{}", Ulid::new().to_string().to_lowercase()))
    }

    /// Whether the mission has no id yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for MissionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MissionId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<MissionId> for String {
    fn from(id: MissionId) -> Self {
        id.0
    }
}

/// Unique identifier for a TransitionEvent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new EventId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for EventId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier for one execution attempt of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new SessionId
    pub fn new() -> Self {
        Self(format!("run_{}", Ulid::new().to_string().to_lowercase()))
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
