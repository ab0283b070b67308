//! Execution layer - dispatch, criterion C and the mission control facade.

#![warn(missing_docs)]

pub mod control;
pub mod engine;
pub mod error;
pub mod pool;
pub mod registry;

#[cfg(test)]
mod fakes;

pub use control::MissionControl;
pub use engine::{EngineConfig, ExecutionEngine, RunAccepted, RunReport};
pub use error::{EngineError, Result};
pub use pool::{JobHandle, JobId, WorkerPool};
pub use registry::{Effect, EffectHandler, EffectRegistry};
