//! Mission quality gates
//!
//! The Done gate, the proof predicate with criterion C, and the watchdog that
//! reclaims stuck runs.

#![warn(missing_docs)]

pub mod gate;
pub mod proof;
pub mod watchdog;

pub use gate::{GuardRejection, check_done, validate_move};
pub use proof::{
    CriterionC, ProofSummary, evaluate_criterion_c, final_status, has_execution_proof,
};
pub use watchdog::{Watchdog, DEFAULT_STUCK_AFTER_MINUTES};
