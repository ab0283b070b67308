//! Board service.
//!
//! Every operation loads a fresh snapshot (rebuilding the index and running
//! the watchdog), mutates a local copy and writes the whole document back.
//! Nothing is saved when an operation fails.

use std::sync::Arc;
use chrono::Utc;
use mission_core::{
    actors, merge_incoming, rebuild_index, stages, Board, Column, ExecutionRecord,
    ExecutionStatus, Mission, MissionId, SessionId, TelemetrySummary, TransitionEvent,
};
use mission_quality::{check_done, has_execution_proof, validate_move, ProofSummary, Watchdog};
use mission_storage::BoardStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{self, Transition};
use crate::classify::{Classifier, KeywordClassifier};
use crate::config::BoardConfig;
use crate::error::{BoardError, Result};

/// Payload for creating a mission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewMission {
    /// Client-chosen id; generated when absent
    pub id: Option<String>,
    /// Title (required)
    pub title: String,
    /// Description
    pub description: String,
    /// Owning agent
    pub agent: String,
    /// Kind; inferred when absent
    pub kind: Option<String>,
    /// Risk level (0, 1 or 2)
    pub risk_level: u8,
}

impl NewMission {
    /// Create a payload with a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the owning agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the risk level.
    pub fn with_risk_level(mut self, risk_level: u8) -> Self {
        self.risk_level = risk_level;
        self
    }
}

/// Identity of a created (or already existing) mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedMission {
    /// Mission id
    pub mission_id: MissionId,
    /// Title
    pub title: String,
    /// Kind, if known
    pub kind: Option<String>,
    /// Whether a run was dispatched
    pub dispatched: bool,
    /// Whether the kind could not be inferred
    pub needs_clarification: bool,
    /// Whether the mission already existed
    pub idempotent: bool,
}

/// A request to move a mission between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoveRequest {
    /// Mission to move
    pub mission_id: MissionId,
    /// Where the caller believes the mission is
    pub from: Option<String>,
    /// Target stage (empty = stay in place, for approvals)
    pub to: String,
    /// Who moves it
    pub actor: String,
    /// Why
    pub reason: String,
    /// Idempotency key
    pub transition_id: Option<String>,
}

impl Default for MoveRequest {
    fn default() -> Self {
        Self {
            mission_id: MissionId::default(),
            from: None,
            to: String::new(),
            actor: actors::CLIENT.to_string(),
            reason: String::new(),
            transition_id: None,
        }
    }
}

impl MoveRequest {
    /// Move `mission_id` to `to` as the client actor.
    pub fn new(mission_id: impl Into<MissionId>, to: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Set the caller's view of the source stage.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
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

    /// Set the idempotency key.
    pub fn with_transition_id(mut self, transition_id: impl Into<String>) -> Self {
        self.transition_id = Some(transition_id.into());
        self
    }
}

/// Outcome of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Moved {
    /// Mission moved
    pub mission_id: MissionId,
    /// Column it actually left
    pub from: String,
    /// Column it entered
    pub to: String,
    /// Whether a new audit event was appended
    pub recorded: bool,
}

/// A mission's audit history with its current proof state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Events, oldest first
    pub events: Vec<TransitionEvent>,
    /// Current proof state
    pub current_proof_summary: ProofSummary,
}

/// Outcome of a board sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Missions whose column changed
    pub moved: Vec<MissionId>,
    /// Missions kept out of Done
    pub blocked: Vec<MissionId>,
    /// Missions absent from the layout and dropped
    pub removed: Vec<MissionId>,
    /// Ids generated for missions without one
    pub assigned: Vec<MissionId>,
}

/// A run that has been started.
#[derive(Debug, Clone)]
pub struct RunStart {
    /// Mission as persisted at start
    pub mission: Mission,
    /// Whether another run was in flight
    pub overridden: bool,
}

/// Final result of a run, as computed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Session of the run
    pub session_id: SessionId,
    /// Final status
    pub status: ExecutionStatus,
    /// New evidence
    pub evidence: Vec<String>,
    /// Executor output summary
    pub summary: Option<String>,
}

/// What completing a run did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCompletion {
    /// Status written
    pub status: ExecutionStatus,
    /// Whether the mission was moved to Verification Pending
    pub relocated: bool,
    /// Whether a newer run had overridden this one
    pub superseded: bool,
}

/// Board operations over a [`BoardStore`].
#[derive(Clone)]
pub struct BoardService {
    store: Arc<dyn BoardStore>,
    classifier: Arc<dyn Classifier>,
    watchdog: Watchdog,
    config: BoardConfig,
}

impl BoardService {
    /// Create a service.
    pub fn new(store: Arc<dyn BoardStore>, config: BoardConfig) -> Self {
        let classifier = Arc::new(KeywordClassifier::lenient(&config.classifier_rules));
        Self {
            store,
            classifier,
            watchdog: Watchdog::from_minutes(config.stuck_threshold_minutes),
            config,
        }
    }

    /// Replace the classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    async fn load(&self) -> Result<Board> {
        let mut board = self.store.get_snapshot().await;
        let rebuild = rebuild_index(&mut board);
        if rebuild.changed_columns() {
            info!(
                "Index rebuilt: {} ids assigned, {} duplicates dropped",
                rebuild.assigned.len(),
                rebuild.dropped.len()
            );
        }

        let forced = self.watchdog.sweep(&mut board, Utc::now());
        if rebuild.changed_columns() || !forced.is_empty() {
            self.save(&board).await?;
        }
        Ok(board)
    }

    async fn save(&self, board: &Board) -> Result<()> {
        self.store.put_snapshot(board).await?;
        Ok(())
    }

    fn record(&self, board: &mut Board, transition: Transition) -> bool {
        audit::record_transition_with(
            board,
            transition,
            self.config.audit_limit,
            self.config.key_retention_factor,
        )
    }

    /// Read the board (with watchdog recovery).
    pub async fn board(&self) -> Result<Board> {
        self.load().await
    }

    /// Create a mission in the ingress column.
    ///
    /// Resubmitting an existing id returns that mission's identity unchanged.
    pub async fn create_mission(&self, request: NewMission) -> Result<CreatedMission> {
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(BoardError::Validation("title is required".to_string()));
        }
        if request.risk_level > 2 {
            return Err(BoardError::Validation(format!(
                "risk level must be 0, 1 or 2 (got {})",
                request.risk_level
            )));
        }

        let mut board = self.load().await?;
        let id = request
            .id
            .as_deref()
            .map(MissionId::new)
            .filter(|id| !id.is_empty());

        if let Some(existing) = id.as_ref().and_then(|id| board.mission(id)) {
            debug!("Mission {} already exists", existing.id);
            return Ok(CreatedMission {
                mission_id: existing.id.clone(),
                title: existing.title.clone(),
                kind: existing.kind.clone(),
                dispatched: false,
                needs_clarification: existing.kind.is_none(),
                idempotent: true,
            });
        }

        let kind = request
            .kind
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| self.classifier.infer(&title, &request.description));

        let mut mission = Mission::new(title.clone())
            .with_description(request.description)
            .with_agent(request.agent)
            .with_risk_level(request.risk_level);
        if let Some(id) = id {
            mission.id = id;
        }
        mission.kind = kind.clone();
        let needs_clarification = kind.is_none();
        if needs_clarification {
            mission.needs_user_action =
                Some("Could not tell what kind of work this is; please clarify".to_string());
        }

        let inbox = board
            .resolve_column(stages::INBOX)
            .ok_or_else(|| BoardError::NotFound(format!("column {}", stages::INBOX)))?;
        let inbox_name = board.columns[inbox].name.clone();
        let mission_id = mission.id.clone();
        board
            .mission_index
            .insert(mission_id.clone(), mission_id.clone());
        board.insert_front(inbox, mission);

        self.record(
            &mut board,
            Transition::new(mission_id.clone(), "", inbox_name)
                .with_actor(actors::CLIENT)
                .with_reason("created")
                .with_title(title.clone())
                .with_transition_id(Some(format!("create:{}", mission_id))),
        );
        self.save(&board).await?;
        info!("Created mission {} ({})", mission_id, title);

        Ok(CreatedMission {
            mission_id,
            title,
            kind,
            dispatched: false,
            needs_clarification,
            idempotent: false,
        })
    }

    /// Move a mission, gating entry into Done.
    pub async fn move_mission(&self, request: MoveRequest) -> Result<Moved> {
        if request.mission_id.is_empty() {
            return Err(BoardError::Validation("mission id is required".to_string()));
        }
        if request.to.trim().is_empty() {
            return Err(BoardError::Validation("target stage is required".to_string()));
        }

        let mut board = self.load().await?;
        let moved = self.apply_move(&mut board, &request)?;
        self.save(&board).await?;
        info!(
            "Moved mission {}: {} -> {}",
            moved.mission_id, moved.from, moved.to
        );
        Ok(moved)
    }

    /// Set `approved`, then move (or stay in place).
    pub async fn approve(&self, request: MoveRequest) -> Result<Moved> {
        self.flag_and_move(request, "approved", |mission| mission.approved = true)
            .await
    }

    /// Set `monarch_approved`, then move (or stay in place).
    pub async fn monarch_ok(&self, request: MoveRequest) -> Result<Moved> {
        self.flag_and_move(request, "monarch_ok", |mission| {
            mission.monarch_approved = true
        })
        .await
    }

    async fn flag_and_move(
        &self,
        mut request: MoveRequest,
        default_reason: &str,
        flag: impl FnOnce(&mut Mission) + Send,
    ) -> Result<Moved> {
        if request.mission_id.is_empty() {
            return Err(BoardError::Validation("mission id is required".to_string()));
        }
        if request.reason.trim().is_empty() {
            request.reason = default_reason.to_string();
        }

        let mut board = self.load().await?;
        let mission = board
            .mission_mut(&request.mission_id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", request.mission_id)))?;
        flag(mission);
        mission.touch();

        // a guard rejection returns before the save, dropping the flag too
        let moved = self.apply_move(&mut board, &request)?;
        self.save(&board).await?;
        info!("{} mission {} in {}", request.reason, moved.mission_id, moved.to);
        Ok(moved)
    }

    /// Append a monarch reply, grant monarch approval and send the mission to
    /// Rework whatever target the caller asked for.
    pub async fn monarch_reply(&self, request: MoveRequest, reply: &str) -> Result<Moved> {
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(BoardError::Validation("reply text is required".to_string()));
        }
        if request.mission_id.is_empty() {
            return Err(BoardError::Validation("mission id is required".to_string()));
        }
        if !request.to.trim().is_empty() && !stages::same(&request.to, stages::REWORK) {
            debug!(
                "Monarch reply for {} requested {}, relocating to {}",
                request.mission_id,
                request.to,
                stages::REWORK
            );
        }

        let mut board = self.load().await?;
        let mission = board
            .mission_mut(&request.mission_id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", request.mission_id)))?;
        mission.description = if mission.description.trim().is_empty() {
            format!("Monarch reply: {}", reply)
        } else {
            format!("{}\n\nMonarch reply: {}", mission.description, reply)
        };
        mission.monarch_approved = true;
        mission.touch();

        let request = MoveRequest {
            to: stages::REWORK.to_string(),
            reason: "monarch_reply".to_string(),
            ..request
        };
        let moved = self.apply_move(&mut board, &request)?;
        self.save(&board).await?;
        info!("Monarch replied to mission {}", moved.mission_id);
        Ok(moved)
    }

    fn apply_move(&self, board: &mut Board, request: &MoveRequest) -> Result<Moved> {
        let id = &request.mission_id;
        let current = board
            .column_of(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?
            .to_string();
        let target = match request.to.trim() {
            "" => current.clone(),
            to => to.to_string(),
        };

        let target_idx = board
            .resolve_column(&target)
            .ok_or_else(|| BoardError::NotFound(format!("column {}", target)))?;
        let mission = board
            .mission(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;
        validate_move(mission, &target)?;

        if let Some(from) = request.from.as_deref().filter(|f| !f.trim().is_empty()) {
            if !stages::same(from, &current) {
                warn!(
                    "Stale move for mission {}: caller expected {:?}, board has {:?}",
                    id, from, current
                );
            }
        }

        let (_, mut mission) = board
            .take_mission(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;
        mission.touch();
        let title = mission.title.clone();
        let to = board.columns[target_idx].name.clone();
        board.insert_front(target_idx, mission);

        let recorded = self.record(
            board,
            Transition::new(id.clone(), current.clone(), to.clone())
                .with_actor(&request.actor)
                .with_reason(&request.reason)
                .with_title(title)
                .with_transition_id(request.transition_id.clone()),
        );

        Ok(Moved {
            mission_id: id.clone(),
            from: current,
            to,
            recorded,
        })
    }

    /// Remove a mission from every column holding it. Returns the column
    /// names it was removed from.
    pub async fn delete_card(&self, id: &MissionId, actor: &str) -> Result<Vec<String>> {
        if id.is_empty() {
            return Err(BoardError::Validation("mission id is required".to_string()));
        }

        let mut board = self.load().await?;
        let mut removed = Vec::new();
        for column in &mut board.columns {
            let mut title = None;
            column.items.retain(|mission| {
                if &mission.id == id {
                    title = Some(mission.title.clone());
                    false
                } else {
                    true
                }
            });
            if let Some(title) = title {
                removed.push((column.name.clone(), title));
            }
        }
        if removed.is_empty() {
            return Err(BoardError::NotFound(format!("mission {}", id)));
        }

        board.mission_index.remove(id);
        for (column, title) in &removed {
            self.record(
                &mut board,
                Transition::new(id.clone(), column.clone(), "deleted")
                    .with_actor(actor)
                    .with_reason("deleted")
                    .with_title(title.clone()),
            );
        }
        self.save(&board).await?;
        info!("Deleted mission {}", id);
        Ok(removed.into_iter().map(|(column, _)| column).collect())
    }

    /// Merge evidence into a mission's execution record, optionally advancing
    /// its status.
    pub async fn record_proof(
        &self,
        id: &MissionId,
        evidence: Vec<String>,
        status: Option<ExecutionStatus>,
    ) -> Result<ExecutionRecord> {
        let mut board = self.load().await?;
        let mission = board
            .mission_mut(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;
        let now = Utc::now();

        let execution = &mut mission.execution;
        let mut started = false;
        if let Some(status) = status {
            if status != execution.status && !execution.status.can_advance_to(status) {
                return Err(BoardError::Validation(format!(
                    "execution status cannot go from {} to {}",
                    execution.status, status
                )));
            }
            // A run reported from outside starts its watchdog clock here
            if status == ExecutionStatus::Running && execution.status != ExecutionStatus::Running {
                execution.started_at = Some(now);
                execution.ended_at = None;
                started = true;
            }
            execution.status = status;
            if status.is_finished() {
                execution.ended_at = Some(now);
            }
        }
        let added = execution.merge_evidence(evidence);
        execution.updated_at = Some(now);
        let record = execution.clone();
        if started {
            mission.needs_user_action = None;
        }
        mission.updated_at = Some(now);

        self.save(&board).await?;
        debug!("Recorded {} evidence entries for mission {}", added, id);
        Ok(record)
    }

    /// Audit history of a mission with its proof summary.
    pub async fn timeline(&self, id: &MissionId) -> Result<Timeline> {
        let board = self.load().await?;
        let mission = board
            .mission(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;
        Ok(Timeline {
            events: audit::timeline(&board, id),
            current_proof_summary: ProofSummary::of(mission),
        })
    }

    /// Replace the column layout with a client-supplied one.
    ///
    /// Protected fields keep their canonical values, missions cannot enter
    /// Done without passing the gate, and missions absent from the layout are
    /// dropped.
    pub async fn replace_columns(&self, incoming: Vec<Column>, actor: &str) -> Result<SyncReport> {
        if incoming.is_empty() {
            return Err(BoardError::Validation("board layout has no columns".to_string()));
        }

        let canonical = self.load().await?;
        let mut board = canonical.clone();
        board.columns = merge_incoming(&canonical, incoming);
        let mut report = SyncReport::default();

        let mut bounced = Vec::new();
        for column in board.columns.iter_mut().filter(|c| stages::is_done(&c.name)) {
            for mission in std::mem::take(&mut column.items) {
                let origin = canonical.column_of(&mission.id);
                let allowed = match origin {
                    Some(name) if stages::is_done(name) => true,
                    Some(_) => check_done(&mission).is_ok(),
                    None => false,
                };
                if allowed {
                    column.items.push(mission);
                } else {
                    warn!(
                        "Board sync kept mission {} out of {}",
                        mission.id,
                        stages::DONE
                    );
                    report.blocked.push(mission.id.clone());
                    bounced.push((origin.unwrap_or(stages::INBOX).to_string(), mission));
                }
            }
        }
        for (name, mission) in bounced {
            let idx = match board.resolve_column(&name) {
                Some(idx) => idx,
                None => {
                    board.columns.push(Column::new(name));
                    board.columns.len() - 1
                }
            };
            board.insert_front(idx, mission);
        }

        let rebuild = rebuild_index(&mut board);
        report.assigned = rebuild.assigned;

        let placements: Vec<_> = board
            .missions()
            .map(|(column, m)| (m.id.clone(), column.to_string(), m.title.clone()))
            .collect();
        for (id, column, title) in placements {
            let origin = canonical.column_of(&id).unwrap_or_default().to_string();
            if stages::same(&origin, &column) {
                continue;
            }
            self.record(
                &mut board,
                Transition::new(id.clone(), origin, column)
                    .with_actor(actor)
                    .with_reason("board_sync")
                    .with_title(title),
            );
            report.moved.push(id);
        }

        let dropped: Vec<_> = canonical
            .missions()
            .filter(|(_, m)| board.mission(&m.id).is_none())
            .map(|(column, m)| (m.id.clone(), column.to_string(), m.title.clone()))
            .collect();
        for (id, column, title) in dropped {
            self.record(
                &mut board,
                Transition::new(id.clone(), column, "deleted")
                    .with_actor(actor)
                    .with_reason("board_sync")
                    .with_title(title),
            );
            report.removed.push(id);
        }

        self.save(&board).await?;
        info!(
            "Board synced: {} moved, {} blocked, {} removed",
            report.moved.len(),
            report.blocked.len(),
            report.removed.len()
        );
        Ok(report)
    }

    /// Board summary, recomputed when the cached one has expired.
    pub async fn telemetry(&self) -> Result<TelemetrySummary> {
        let mut board = self.load().await?;
        if let Some(summary) = &board.telemetry {
            if summary.is_fresh(Utc::now()) {
                return Ok(summary.clone());
            }
        }

        let summary =
            TelemetrySummary::compute(&board, self.config.telemetry_ttl_seconds, has_execution_proof);
        board.telemetry = Some(summary.clone());
        self.save(&board).await?;
        Ok(summary)
    }

    /// Mark a mission running under a fresh session and persist.
    pub async fn begin_execution(&self, id: &MissionId, session: SessionId) -> Result<RunStart> {
        let mut board = self.load().await?;
        let mission = board
            .mission_mut(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;

        let overridden = mission.execution.status == ExecutionStatus::Running;
        if overridden {
            warn!(
                "Mission {} already running (session {}), overriding with {}",
                id,
                mission
                    .execution
                    .session_id
                    .as_ref()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                session
            );
        }

        let now = Utc::now();
        let agent = Some(mission.agent.clone()).filter(|a| !a.is_empty());
        let execution = &mut mission.execution;
        execution.status = ExecutionStatus::Running;
        execution.session_id = Some(session);
        execution.agent = agent;
        execution.started_at = Some(now);
        execution.updated_at = Some(now);
        execution.ended_at = None;
        mission.needs_user_action = None;
        mission.updated_at = Some(now);
        let started = mission.clone();

        self.save(&board).await?;
        Ok(RunStart {
            mission: started,
            overridden,
        })
    }

    /// Write a run's final status and evidence onto the latest snapshot,
    /// rerouting proof_pending missions to Verification Pending.
    pub async fn complete_execution(&self, id: &MissionId, result: RunResult) -> Result<RunCompletion> {
        let mut board = self.load().await?;
        let mission = board
            .mission_mut(id)
            .ok_or_else(|| BoardError::NotFound(format!("mission {}", id)))?;

        let superseded = mission.execution.session_id.as_ref() != Some(&result.session_id);
        if superseded {
            warn!(
                "Run {} for mission {} finished after being overridden",
                result.session_id, id
            );
        }

        let now = Utc::now();
        let execution = &mut mission.execution;
        execution.status = result.status;
        execution.ended_at = Some(now);
        execution.updated_at = Some(now);
        execution.merge_evidence(result.evidence);
        if result.summary.is_some() {
            execution.summary = result.summary;
        }
        mission.updated_at = Some(now);
        let title = mission.title.clone();

        let mut relocated = false;
        if result.status == ExecutionStatus::ProofPending {
            let in_verification = board
                .column_of(id)
                .map(|c| stages::same(c, stages::VERIFICATION_PENDING))
                .unwrap_or(false);
            if !in_verification {
                let target = board.resolve_column(stages::VERIFICATION_PENDING).ok_or_else(|| {
                    BoardError::NotFound(format!("column {}", stages::VERIFICATION_PENDING))
                })?;
                if let Some((from, mission)) = board.take_mission(id) {
                    let to = board.columns[target].name.clone();
                    board.insert_front(target, mission);
                    self.record(
                        &mut board,
                        Transition::new(id.clone(), from, to)
                            .with_actor(actors::ENGINE)
                            .with_reason("criterion_c_missing")
                            .with_title(title),
                    );
                    relocated = true;
                }
            }
        }

        self.save(&board).await?;
        info!("Mission {} finished as {}", id, result.status);
        Ok(RunCompletion {
            status: result.status,
            relocated,
            superseded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mission_quality::GuardRejection;
    use mission_storage::MemoryBoardStore;

    fn service() -> (BoardService, Arc<MemoryBoardStore>) {
        let store = Arc::new(MemoryBoardStore::new());
        let service = BoardService::new(store.clone(), BoardConfig::default());
        (service, store)
    }

    async fn prove(service: &BoardService, id: &MissionId) {
        let session = SessionId::new();
        service.begin_execution(id, session.clone()).await.unwrap();
        service
            .complete_execution(
                id,
                RunResult {
                    session_id: session,
                    status: ExecutionStatus::Effective,
                    evidence: vec!["M header.rs".to_string()],
                    summary: None,
                },
            )
            .await
            .unwrap();
    }

    fn creation_events(board: &Board, id: &MissionId) -> usize {
        board
            .audit_trail
            .iter()
            .filter(|e| &e.mission_id == id && e.reason == "created")
            .count()
    }

    #[tokio::test]
    async fn test_create_is_idempotent_by_id() {
        let (service, _) = service();
        let first = service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        assert!(!first.idempotent);
        assert_eq!(first.kind.as_deref(), Some("code"));

        let second = service
            .create_mission(NewMission::new("Another title").with_id("m1"))
            .await
            .unwrap();
        assert!(second.idempotent);
        assert_eq!(second.title, "Fix header");

        let board = service.board().await.unwrap();
        assert_eq!(board.missions().count(), 1);
        assert_eq!(creation_events(&board, &"m1".into()), 1);
        assert_eq!(board.column_of(&"m1".into()), Some(stages::INBOX));
    }

    #[tokio::test]
    async fn test_create_flags_unclassified() {
        let (service, _) = service();
        let created = service
            .create_mission(NewMission::new("Something vague"))
            .await
            .unwrap();
        assert!(created.needs_clarification);

        let board = service.board().await.unwrap();
        let mission = board.mission(&created.mission_id).unwrap();
        assert!(mission.needs_user_action.is_some());
        assert!(mission.id.as_str().starts_with("m_"));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, store) = service();
        let err = service.create_mission(NewMission::new("  ")).await.unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
        let err = service
            .create_mission(NewMission::new("x").with_risk_level(3))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_done_requires_proof_and_board_unchanged() {
        let (service, store) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        let before = service.board().await.unwrap();
        let writes = store.writes();

        let err = service
            .move_mission(MoveRequest::new("m1", stages::DONE))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Guard(GuardRejection::DoneRequiresProof)));
        assert_eq!(store.writes(), writes);

        let after = service.board().await.unwrap();
        assert_eq!(after.columns, before.columns);
        assert_eq!(after.audit_trail.len(), before.audit_trail.len());
    }

    #[tokio::test]
    async fn test_monarch_approval_gate() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1").with_risk_level(2))
            .await
            .unwrap();
        prove(&service, &"m1".into()).await;

        let err = service
            .approve(MoveRequest::new("m1", stages::DONE))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::Guard(GuardRejection::DoneRequiresMonarchApproval)
        ));
        // rejected approval leaves the flag unset
        let board = service.board().await.unwrap();
        assert!(!board.mission(&"m1".into()).unwrap().approved);

        service.approve(MoveRequest::new("m1", "")).await.unwrap();
        service
            .monarch_ok(MoveRequest::new("m1", stages::REVIEW))
            .await
            .unwrap();
        let moved = service
            .move_mission(MoveRequest::new("m1", stages::DONE))
            .await
            .unwrap();
        assert_eq!(moved.from, stages::REVIEW);
        assert_eq!(moved.to, stages::DONE);
    }

    #[tokio::test]
    async fn test_move_records_actual_source() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();

        let moved = service
            .move_mission(MoveRequest::new("m1", "review").with_from(stages::ASSIGNED))
            .await
            .unwrap();
        assert_eq!(moved.from, stages::INBOX);
        assert_eq!(moved.to, stages::REVIEW);
        assert!(moved.recorded);

        let timeline = service.timeline(&"m1".into()).await.unwrap();
        assert_eq!(timeline.events.len(), 2);
        assert_eq!(timeline.events[1].from, stages::INBOX);
        assert!(!timeline.current_proof_summary.effective);
    }

    #[tokio::test]
    async fn test_key_retention_from_config() {
        let config = BoardConfig {
            audit_limit: 1,
            key_retention_factor: 0,
            ..BoardConfig::default()
        };
        let service = BoardService::new(Arc::new(MemoryBoardStore::new()), config);
        service
            .create_mission(NewMission::new("x").with_id("m1"))
            .await
            .unwrap();
        for (to, key) in [(stages::REVIEW, "t-1"), (stages::REWORK, "t-2"), (stages::ASSIGNED, "t-3")] {
            let moved = service
                .move_mission(MoveRequest::new("m1", to).with_transition_id(key))
                .await
                .unwrap();
            assert!(moved.recorded);
        }

        let replay = service
            .move_mission(MoveRequest::new("m1", stages::REVIEW).with_transition_id("t-1"))
            .await
            .unwrap();
        assert!(!replay.recorded);
        let board = service.board().await.unwrap();
        assert_eq!(board.audit_trail.len(), 1);
        assert_eq!(board.transition_keys.len(), 4);
    }

    #[tokio::test]
    async fn test_move_errors() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("x").with_id("m1"))
            .await
            .unwrap();

        let err = service.move_mission(MoveRequest::new("m1", "")).await.unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
        let err = service
            .move_mission(MoveRequest::new("missing", stages::REVIEW))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
        let err = service
            .move_mission(MoveRequest::new("m1", "Nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_monarch_reply_forces_rework() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1").with_description("old"))
            .await
            .unwrap();

        let moved = service
            .monarch_reply(MoveRequest::new("m1", stages::DONE), "use the blue logo")
            .await
            .unwrap();
        assert_eq!(moved.to, stages::REWORK);

        let board = service.board().await.unwrap();
        let mission = board.mission(&"m1".into()).unwrap();
        assert!(mission.monarch_approved);
        assert!(mission.description.starts_with("old"));
        assert!(mission.description.ends_with("Monarch reply: use the blue logo"));
    }

    #[tokio::test]
    async fn test_delete_records_removal() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("x").with_id("m1"))
            .await
            .unwrap();

        let removed = service.delete_card(&"m1".into(), actors::CLIENT).await.unwrap();
        assert_eq!(removed, vec![stages::INBOX.to_string()]);

        let board = service.board().await.unwrap();
        assert!(board.mission(&"m1".into()).is_none());
        assert!(board
            .audit_trail
            .iter()
            .any(|e| e.mission_id.as_str() == "m1" && e.to == "deleted"));

        let err = service.delete_card(&"m1".into(), actors::CLIENT).await.unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_record_proof() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("x").with_id("m1"))
            .await
            .unwrap();
        let id: MissionId = "m1".into();

        let err = service
            .record_proof(&id, vec![], Some(ExecutionStatus::Effective))
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));

        let running = service
            .record_proof(&id, vec!["a".into()], Some(ExecutionStatus::Running))
            .await
            .unwrap();
        assert!(running.started_at.is_some());
        let board = service.board().await.unwrap();
        assert_eq!(
            board.mission(&id).unwrap().execution.status,
            ExecutionStatus::Running
        );
        let record = service
            .record_proof(
                &id,
                vec!["a".into(), " b ".into()],
                Some(ExecutionStatus::Effective),
            )
            .await
            .unwrap();
        assert_eq!(record.evidence, vec!["a".to_string(), "b".to_string()]);
        assert!(record.ended_at.is_some());

        service
            .move_mission(MoveRequest::new("m1", stages::DONE))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reported_run_restarts_clock() {
        let mut mission = Mission::new("retry").with_id("m1");
        mission.execution.status = ExecutionStatus::Failed;
        mission.execution.started_at = Some(Utc::now() - Duration::hours(3));
        mission.execution.ended_at = Some(Utc::now() - Duration::hours(2));
        mission.needs_user_action = Some("check the logs".into());
        let mut board = Board::skeleton();
        let inbox = board.column_index(stages::INBOX).unwrap();
        board.insert_front(inbox, mission);
        let store = Arc::new(MemoryBoardStore::with_board(board));
        let service = BoardService::new(store, BoardConfig::default());
        let id: MissionId = "m1".into();

        let record = service
            .record_proof(&id, vec![], Some(ExecutionStatus::Running))
            .await
            .unwrap();
        assert!(record.ended_at.is_none());
        assert!(record.started_at.unwrap() > Utc::now() - Duration::minutes(1));

        let board = service.board().await.unwrap();
        let mission = board.mission(&id).unwrap();
        assert_eq!(mission.execution.status, ExecutionStatus::Running);
        assert!(mission.needs_user_action.is_none());

        let record = service
            .record_proof(&id, vec!["done".into()], Some(ExecutionStatus::Effective))
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Effective);
    }

    #[tokio::test]
    async fn test_watchdog_runs_on_read() {
        let now = Utc::now();
        let mut stuck = Mission::new("stuck").with_id("old");
        stuck.execution.status = ExecutionStatus::Running;
        stuck.execution.started_at = Some(now - Duration::minutes(20));
        let mut fresh = Mission::new("fresh").with_id("young");
        fresh.execution.status = ExecutionStatus::Running;
        fresh.execution.started_at = Some(now - Duration::minutes(2));

        let mut board = Board::skeleton();
        board.columns[2].items = vec![stuck, fresh];
        let store = Arc::new(MemoryBoardStore::with_board(board));
        let service = BoardService::new(store.clone(), BoardConfig::default());

        let board = service.board().await.unwrap();
        let stuck = board.mission(&"old".into()).unwrap();
        assert_eq!(stuck.execution.status, ExecutionStatus::Failed);
        assert!(stuck.execution.evidence[0].contains("forced failed after timeout"));
        assert_eq!(
            board.mission(&"young".into()).unwrap().execution.status,
            ExecutionStatus::Running
        );
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test]
    async fn test_board_sync_protects_fields_and_done() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        service
            .create_mission(NewMission::new("Write docs").with_id("m2"))
            .await
            .unwrap();
        service
            .create_mission(NewMission::new("Old task").with_id("m3"))
            .await
            .unwrap();

        let mut smuggled = Mission::new("renamed").with_id("m1");
        smuggled.execution.status = ExecutionStatus::Effective;
        smuggled.execution.merge_evidence(["forged"]);
        let mut reviewed = Mission::new("Write docs").with_id("m2");
        reviewed.risk_level = 1;

        let layout = vec![
            Column::new(stages::INBOX),
            Column {
                name: stages::REVIEW.to_string(),
                items: vec![reviewed],
            },
            Column {
                name: stages::DONE.to_string(),
                items: vec![smuggled],
            },
        ];
        let report = service.replace_columns(layout, actors::CLIENT).await.unwrap();
        assert_eq!(report.blocked, vec![MissionId::new("m1")]);
        assert_eq!(report.removed, vec![MissionId::new("m3")]);
        assert_eq!(report.moved, vec![MissionId::new("m2")]);

        let board = service.board().await.unwrap();
        let m1 = board.mission(&"m1".into()).unwrap();
        assert_eq!(board.column_of(&"m1".into()), Some(stages::INBOX));
        assert_eq!(m1.title, "Fix header");
        assert!(m1.execution.evidence.is_empty());
        assert_eq!(board.mission(&"m2".into()).unwrap().risk_level, 1);
        assert!(board.mission(&"m3".into()).is_none());
        assert!(board
            .audit_trail
            .iter()
            .any(|e| e.mission_id.as_str() == "m2" && e.reason == "board_sync"));
    }

    #[tokio::test]
    async fn test_proof_pending_relocates() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        let id: MissionId = "m1".into();
        let session = SessionId::new();
        let start = service.begin_execution(&id, session.clone()).await.unwrap();
        assert!(!start.overridden);
        assert_eq!(start.mission.execution.status, ExecutionStatus::Running);

        let completion = service
            .complete_execution(
                &id,
                RunResult {
                    session_id: session,
                    status: ExecutionStatus::ProofPending,
                    evidence: vec![],
                    summary: Some("nothing changed".into()),
                },
            )
            .await
            .unwrap();
        assert!(completion.relocated);
        assert!(!completion.superseded);

        let board = service.board().await.unwrap();
        assert_eq!(board.column_of(&id), Some(stages::VERIFICATION_PENDING));
        assert!(board
            .audit_trail
            .iter()
            .any(|e| e.reason == "criterion_c_missing" && e.to == stages::VERIFICATION_PENDING));
    }

    #[tokio::test]
    async fn test_second_run_overrides() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("x").with_id("m1"))
            .await
            .unwrap();
        let id: MissionId = "m1".into();
        let first = SessionId::new();
        service.begin_execution(&id, first.clone()).await.unwrap();
        let second = service.begin_execution(&id, SessionId::new()).await.unwrap();
        assert!(second.overridden);

        let completion = service
            .complete_execution(
                &id,
                RunResult {
                    session_id: first,
                    status: ExecutionStatus::Failed,
                    evidence: vec!["boom".into()],
                    summary: None,
                },
            )
            .await
            .unwrap();
        assert!(completion.superseded);
    }

    #[tokio::test]
    async fn test_telemetry_is_cached() {
        let (service, _) = service();
        service
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        prove(&service, &"m1".into()).await;

        let first = service.telemetry().await.unwrap();
        assert_eq!(first.total, 1);
        assert_eq!(first.proven, 1);
        assert_eq!(first.by_status.get("effective"), Some(&1));

        service
            .create_mission(NewMission::new("More work").with_id("m2"))
            .await
            .unwrap();
        let second = service.telemetry().await.unwrap();
        assert_eq!(second.computed_at, first.computed_at);
        assert_eq!(second.total, 1);
    }
}
