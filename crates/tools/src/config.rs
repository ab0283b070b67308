//! Configuration for the builtin collaborators.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use crate::builtin::{
    GitWorkspaceInspector, LogNotifier, ProcessExecutor, UnconfiguredExecutor, WebhookNotifier,
};
use crate::r#trait::{Executor, Notifier};

/// Settings for the builtin executor, inspector and notifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Command used to execute missions (none = no external executor)
    pub executor: Option<CommandSpec>,

    /// Directory holding `workspace-<agent>` checkouts
    pub workspace_root: Option<PathBuf>,

    /// Per-agent workspace overrides
    pub workspaces: HashMap<String, PathBuf>,

    /// Webhook receiving notifications (none = log only)
    pub webhook_url: Option<String>,

    /// Per-kind commands; missions of these kinds run through their own
    /// command and are dispatched as soon as they are created
    pub effects: HashMap<String, CommandSpec>,
}

impl ToolsConfig {
    /// The configured executor.
    pub fn build_executor(&self) -> Arc<dyn Executor> {
        match &self.executor {
            Some(spec) => Arc::new(ProcessExecutor::new(spec.clone())),
            None => Arc::new(UnconfiguredExecutor),
        }
    }

    /// One executor per configured kind, sorted by kind.
    pub fn build_effect_executors(&self) -> Vec<(String, Arc<dyn Executor>)> {
        let mut executors: Vec<(String, Arc<dyn Executor>)> = self
            .effects
            .iter()
            .map(|(kind, spec)| {
                let executor: Arc<dyn Executor> = Arc::new(ProcessExecutor::new(spec.clone()));
                (kind.clone(), executor)
            })
            .collect();
        executors.sort_by(|a, b| a.0.cmp(&b.0));
        executors
    }

    /// Git inspector over the configured workspaces.
    pub fn build_inspector(&self) -> GitWorkspaceInspector {
        GitWorkspaceInspector::new(self.workspace_root.clone())
            .with_workspaces(self.workspaces.clone())
    }

    /// Webhook notifier when a URL is configured, else the log notifier.
    pub fn build_notifier(&self) -> Arc<dyn Notifier> {
        match &self.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
            None => Arc::new(LogNotifier),
        }
    }
}

/// An external command template.
///
/// `{agent}`, `{session}` and `{message}` in `args` are replaced per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to run
    pub program: String,

    /// Argument template
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}
