//! Built-in collaborators (process executor, git inspector, notifiers).

use super::r#trait::*;
use super::config::CommandSpec;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Executor running an external command per mission.
///
/// Lines of stdout shaped like `evidence: <text>` are reported as evidence;
/// a zero exit status is success. The child is killed when the run future is
/// dropped or the timeout expires.
pub struct ProcessExecutor {
    spec: CommandSpec,
}

impl ProcessExecutor {
    /// Create an executor from a command template.
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    fn render(template: &str, request: &ExecutorRequest) -> String {
        template
            .replace("{agent}", &request.agent_id)
            .replace("{session}", &request.session_id)
            .replace("{message}", &request.message)
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &str {
        &self.spec.program
    }

    async fn run(&self, request: &ExecutorRequest) -> Result<ExecutorOutcome, ExecutorError> {
        let args: Vec<String> = self
            .spec
            .args
            .iter()
            .map(|arg| Self::render(arg, request))
            .collect();

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&args)
            .env("MISSION_AGENT", &request.agent_id)
            .env("MISSION_SESSION", &request.session_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (k, v) in &self.spec.env {
            cmd.env(k, v);
        }
        if let Some(dir) = &self.spec.working_dir {
            cmd.current_dir(dir);
        }

        debug!(program = %self.spec.program, ?args, "Starting executor process");
        let child = cmd.spawn().map_err(ExecutorError::Spawn)?;

        let output = match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Executor {} timed out after {}s for session {}; process killed",
                    self.spec.program,
                    request.timeout.as_secs(),
                    request.session_id
                );
                return Err(ExecutorError::Timeout(request.timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let success = output.status.success();
        let output_text = if success {
            stdout.trim().to_string()
        } else {
            format!("{}\n{}", stdout.trim(), stderr.trim()).trim().to_string()
        };

        Ok(ExecutorOutcome {
            success,
            evidence: parse_evidence(&stdout),
            output_text,
        })
    }
}

fn parse_evidence(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (head, rest) = line.trim().split_once(':')?;
            head.trim()
                .eq_ignore_ascii_case("evidence")
                .then(|| rest.trim().to_string())
        })
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Inspector treating each agent's git checkout as its execution context.
///
/// The signature hashes HEAD, every pending change and the content of changed
/// files, so editing an already-dirty file still changes it. Contexts that are
/// missing or not git repositories are non-trackable.
#[derive(Debug, Clone, Default)]
pub struct GitWorkspaceInspector {
    root: Option<PathBuf>,
    workspaces: HashMap<String, PathBuf>,
}

impl GitWorkspaceInspector {
    /// Create an inspector looking for `workspace-<agent>` under `root`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            workspaces: HashMap::new(),
        }
    }

    /// Pin an agent to an explicit workspace.
    pub fn with_workspace(mut self, agent: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.workspaces.insert(agent.into(), path.into());
        self
    }

    /// Pin several agents at once.
    pub fn with_workspaces(mut self, workspaces: HashMap<String, PathBuf>) -> Self {
        self.workspaces.extend(workspaces);
        self
    }

    /// Resolve the workspace directory of a context.
    pub fn resolve(&self, context_id: &str) -> Option<PathBuf> {
        if let Some(path) = self.workspaces.get(context_id) {
            return Some(path.clone());
        }
        if context_id.is_empty() {
            return None;
        }
        let candidate = self.root.as_ref()?.join(format!("workspace-{}", context_id));
        candidate.is_dir().then_some(candidate)
    }
}

#[async_trait]
impl WorkspaceInspector for GitWorkspaceInspector {
    async fn snapshot(&self, context_id: &str) -> WorkspaceSnapshot {
        let Some(path) = self.resolve(context_id) else {
            debug!("No workspace for context '{}'", context_id);
            return WorkspaceSnapshot::untracked();
        };

        match tokio::task::spawn_blocking(move || git_snapshot(&path)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Workspace snapshot for '{}' failed: {}", context_id, e);
                WorkspaceSnapshot::untracked()
            }
        }
    }
}

fn git_snapshot(path: &Path) -> WorkspaceSnapshot {
    let repo = match git2::Repository::open(path) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("{} is not a git workspace: {}", path.display(), e);
            return WorkspaceSnapshot::untracked();
        }
    };

    let mut hasher = Sha256::new();
    let head = repo
        .head()
        .ok()
        .and_then(|h| h.target())
        .map(|oid| oid.to_string())
        .unwrap_or_else(|| "unborn".to_string());
    hasher.update(b"HEAD ");
    hasher.update(head.as_bytes());
    hasher.update(b"\n");

    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = match repo.statuses(Some(&mut opts)) {
        Ok(statuses) => statuses,
        Err(e) => {
            warn!("Cannot read git status of {}: {}", path.display(), e);
            return WorkspaceSnapshot::untracked();
        }
    };

    let workdir = repo.workdir().map(Path::to_path_buf);
    let mut lines = Vec::new();
    for entry in statuses.iter() {
        let Some(rel) = entry.path() else { continue };
        let code = status_code(entry.status());

        hasher.update(code.as_bytes());
        hasher.update(b" ");
        hasher.update(rel.as_bytes());
        hasher.update(b"\n");
        if let Some(dir) = &workdir {
            if let Ok(bytes) = std::fs::read(dir.join(rel)) {
                hasher.update(Sha256::digest(&bytes));
            }
        }

        lines.push(format!("{} {}", code, rel));
    }

    WorkspaceSnapshot {
        trackable: true,
        change_signature: hex::encode(hasher.finalize()),
        change_summary: lines.join("\n"),
    }
}

fn status_code(status: git2::Status) -> &'static str {
    use git2::Status;

    if status.contains(Status::CONFLICTED) {
        "U"
    } else if status.intersects(Status::INDEX_NEW) {
        "A"
    } else if status.intersects(Status::WT_NEW) {
        "??"
    } else if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
        "D"
    } else if status.intersects(Status::INDEX_RENAMED | Status::WT_RENAMED) {
        "R"
    } else if status.intersects(Status::INDEX_TYPECHANGE | Status::WT_TYPECHANGE) {
        "T"
    } else if status.intersects(Status::INDEX_MODIFIED | Status::WT_MODIFIED) {
        "M"
    } else {
        "?"
    }
}

/// Executor used when no command is configured. Every run fails.
pub struct UnconfiguredExecutor;

#[async_trait]
impl Executor for UnconfiguredExecutor {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn run(&self, request: &ExecutorRequest) -> Result<ExecutorOutcome, ExecutorError> {
        warn!("No executor configured; session {} not run", request.session_id);
        Err(ExecutorError::Other("no executor configured".to_string()))
    }
}

/// Notifier that only logs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel: &str, target: &str, message: &str) -> bool {
        info!(channel, target, "Notification: {}", message);
        true
    }
}

/// Notifier posting JSON to a webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, channel: &str, target: &str, message: &str) -> bool {
        let payload = serde_json::json!({
            "channel": channel,
            "target": target,
            "message": message,
        });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Webhook {} rejected notification: {}", self.url, resp.status());
                false
            }
            Err(e) => {
                warn!("Webhook {} unreachable: {}", self.url, e);
                false
            }
        }
    }
}
