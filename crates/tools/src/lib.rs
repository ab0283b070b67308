//! Collaborator integration
//!
//! Contracts for the external collaborators the board consumes (executor,
//! workspace inspector, notifier) and their builtin implementations.

#![warn(missing_docs)]

pub mod r#trait;
pub mod builtin;
pub mod config;

pub use r#trait::{
    Executor, ExecutorRequest, ExecutorOutcome, ExecutorError,
    WorkspaceInspector, WorkspaceSnapshot, Notifier,
};
pub use builtin::{
    ProcessExecutor, UnconfiguredExecutor, GitWorkspaceInspector, LogNotifier, WebhookNotifier,
};
pub use config::{ToolsConfig, CommandSpec};
