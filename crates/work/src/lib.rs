//! Mission board operations
//!
//! Creation, guarded moves, approvals, proof recording, the audit trail and
//! board sync, all as load-mutate-save over a [`mission_storage::BoardStore`].

#![warn(missing_docs)]

pub mod audit;
pub mod classify;
pub mod config;
pub mod error;
pub mod service;

pub use audit::{
    record_transition, record_transition_with, timeline, transition_key, Transition,
    DEFAULT_AUDIT_LIMIT, KEY_RETENTION_FACTOR,
};
pub use classify::{Classifier, KeywordClassifier, KeywordRule};
pub use config::BoardConfig;
pub use error::{BoardError, Result};
pub use service::{
    BoardService, CreatedMission, MoveRequest, Moved, NewMission, RunCompletion, RunResult,
    RunStart, SyncReport, Timeline,
};
