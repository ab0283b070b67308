//! Mission board core data models.
//!
//! This crate defines the board snapshot (columns of missions, the mission
//! index, the audit trail) and the pure index operations over it.

#![warn(missing_docs)]

// Core identities
mod id;

// Board document
mod mission;
mod board;
mod event;
mod cache;
mod lenient;

// Index maintenance
pub mod index;

// Re-exports
pub use id::{MissionId, EventId, SessionId};

pub use mission::{Mission, ExecutionRecord, ExecutionStatus, UnknownStatus};
pub use board::{Board, Column, Location, stages};
pub use event::{TransitionEvent, actors};
pub use cache::TelemetrySummary;
pub use index::{rebuild_index, merge_incoming, IndexRebuild};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
