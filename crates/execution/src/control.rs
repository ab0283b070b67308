//! Mission control facade: every board operation plus dispatch.

use mission_core::{Board, Column, ExecutionRecord, ExecutionStatus, MissionId, TelemetrySummary};
use mission_work::{
    BoardService, CreatedMission, MoveRequest, Moved, NewMission, SyncReport, Timeline,
};
use tracing::{debug, info};

use crate::engine::{ExecutionEngine, RunAccepted};
use crate::error::Result;

/// The operation surface of the mission board.
#[derive(Clone)]
pub struct MissionControl {
    board: BoardService,
    engine: ExecutionEngine,
}

impl MissionControl {
    /// Create a facade over a board service and the engine dispatching its
    /// missions.
    pub fn new(board: BoardService, engine: ExecutionEngine) -> Self {
        Self { board, engine }
    }

    /// The board service.
    pub fn board_service(&self) -> &BoardService {
        &self.board
    }

    /// The execution engine.
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Create a mission, dispatching it right away when auto-dispatch is on
    /// and its kind has an effect. The run continues detached.
    pub async fn create_mission(&self, request: NewMission) -> Result<CreatedMission> {
        let (created, accepted) = self.create_and_dispatch(request).await?;
        if let Some(accepted) = accepted {
            debug!(
                "Auto-dispatched mission {} as job {}",
                created.mission_id, accepted.handle.id
            );
        }
        Ok(created)
    }

    /// [`create_mission`](Self::create_mission), handing back the dispatched
    /// run so the caller can await it.
    pub async fn create_and_dispatch(
        &self,
        request: NewMission,
    ) -> Result<(CreatedMission, Option<RunAccepted>)> {
        let mut created = self.board.create_mission(request).await?;
        if created.idempotent || !self.engine.config().auto_dispatch {
            return Ok((created, None));
        }

        let handled = created
            .kind
            .as_deref()
            .map(|kind| self.engine.effects().contains(kind))
            .unwrap_or(false);
        if !handled {
            return Ok((created, None));
        }
        let accepted = self.engine.run_mission(&created.mission_id).await?;
        created.dispatched = true;
        Ok((created, Some(accepted)))
    }

    /// Move a mission between stages.
    pub async fn move_mission(&self, request: MoveRequest) -> Result<Moved> {
        Ok(self.board.move_mission(request).await?)
    }

    /// Dispatch a run.
    pub async fn run_mission(&self, id: &MissionId) -> Result<RunAccepted> {
        self.engine.run_mission(id).await
    }

    /// Merge evidence and optionally advance the execution status.
    pub async fn record_proof(
        &self,
        id: &MissionId,
        evidence: Vec<String>,
        status: Option<ExecutionStatus>,
    ) -> Result<ExecutionRecord> {
        Ok(self.board.record_proof(id, evidence, status).await?)
    }

    /// Audit history and proof summary.
    pub async fn timeline(&self, id: &MissionId) -> Result<Timeline> {
        Ok(self.board.timeline(id).await?)
    }

    /// Delete a mission card.
    pub async fn delete_card(&self, id: &MissionId, actor: &str) -> Result<Vec<String>> {
        Ok(self.board.delete_card(id, actor).await?)
    }

    /// Approve, then move.
    pub async fn approve(&self, request: MoveRequest) -> Result<Moved> {
        Ok(self.board.approve(request).await?)
    }

    /// Grant monarch approval, then move.
    pub async fn monarch_ok(&self, request: MoveRequest) -> Result<Moved> {
        Ok(self.board.monarch_ok(request).await?)
    }

    /// Record a monarch reply, send the mission to Rework and restart it.
    pub async fn monarch_reply(
        &self,
        request: MoveRequest,
        reply: &str,
    ) -> Result<(Moved, RunAccepted)> {
        let moved = self.board.monarch_reply(request, reply).await?;
        let accepted = self.engine.run_mission(&moved.mission_id).await?;
        info!(
            "Restarted mission {} after monarch reply (session {})",
            moved.mission_id, accepted.session_id
        );
        Ok((moved, accepted))
    }

    /// Read the board.
    pub async fn board(&self) -> Result<Board> {
        Ok(self.board.board().await?)
    }

    /// Replace the column layout.
    pub async fn replace_columns(&self, columns: Vec<Column>, actor: &str) -> Result<SyncReport> {
        Ok(self.board.replace_columns(columns, actor).await?)
    }

    /// Cached board summary.
    pub async fn telemetry(&self) -> Result<TelemetrySummary> {
        Ok(self.board.telemetry().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::fakes::*;
    use crate::registry::EffectRegistry;
    use mission_core::stages;
    use mission_tools::ExecutorOutcome;

    fn control(rig: &Rig) -> MissionControl {
        let engine = rig.engine.clone().with_effects(EffectRegistry::new().with(
            "reply",
            |mission| ExecutorOutcome {
                success: true,
                output_text: String::new(),
                evidence: vec![format!("replied: {}", mission.title)],
            },
        ));
        MissionControl::new(rig.board.clone(), engine)
    }

    async fn wait_for_status(control: &MissionControl, id: &MissionId, status: ExecutionStatus) {
        for _ in 0..100 {
            let board = control.board().await.unwrap();
            if board.mission(id).map(|m| m.execution.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("mission {} never reached {}", id, status);
    }

    #[tokio::test]
    async fn test_create_auto_dispatches_handled_kind() {
        let rig = Rig::new(
            ScriptedExecutor::new(ExecutorOutcome::default()),
            ScriptedInspector::untracked(),
        );
        let control = control(&rig);

        let created = control
            .create_mission(NewMission::new("Answer the customer").with_id("m1").with_kind("Reply"))
            .await
            .unwrap();
        assert!(created.dispatched);
        wait_for_status(&control, &created.mission_id, ExecutionStatus::Effective).await;

        let again = control
            .create_mission(NewMission::new("Answer the customer").with_id("m1").with_kind("reply"))
            .await
            .unwrap();
        assert!(again.idempotent);
        assert!(!again.dispatched);
    }

    #[tokio::test]
    async fn test_create_and_dispatch_returns_run() {
        let rig = Rig::new(
            ScriptedExecutor::new(ExecutorOutcome::default()),
            ScriptedInspector::untracked(),
        );
        let control = control(&rig);

        let (created, accepted) = control
            .create_and_dispatch(NewMission::new("Answer").with_id("m1").with_kind("reply"))
            .await
            .unwrap();
        assert!(created.dispatched);
        let report = accepted.unwrap().handle.wait().await.unwrap().unwrap();
        assert_eq!(report.evidence, vec!["replied: Answer".to_string()]);

        let (_, accepted) = control
            .create_and_dispatch(NewMission::new("Fix header").with_id("m2"))
            .await
            .unwrap();
        assert!(accepted.is_none());
    }

    #[tokio::test]
    async fn test_create_without_handler_stays_pending() {
        let rig = Rig::new(
            ScriptedExecutor::new(ExecutorOutcome::default()),
            ScriptedInspector::untracked(),
        );
        let control = control(&rig);

        let created = control
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();
        assert_eq!(created.kind.as_deref(), Some("code"));
        assert!(!created.dispatched);

        let board = control.board().await.unwrap();
        assert_eq!(
            board.mission(&created.mission_id).unwrap().execution.status,
            ExecutionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_monarch_reply_restarts_run() {
        let rig = Rig::new(
            ScriptedExecutor::new(ExecutorOutcome {
                success: true,
                output_text: String::new(),
                evidence: vec!["applied feedback".into()],
            }),
            ScriptedInspector::untracked(),
        );
        let control = control(&rig);
        control
            .create_mission(NewMission::new("Fix header").with_id("m1"))
            .await
            .unwrap();

        let (moved, accepted) = control
            .monarch_reply(MoveRequest::new("m1", stages::DONE), "make it bold")
            .await
            .unwrap();
        assert_eq!(moved.to, stages::REWORK);
        assert!(accepted.queued);

        let report = accepted.handle.wait().await.unwrap().unwrap();
        assert_eq!(report.status, ExecutionStatus::Effective);

        let board = control.board().await.unwrap();
        assert_eq!(board.column_of(&"m1".into()), Some(stages::REWORK));
        assert!(board.mission(&"m1".into()).unwrap().monarch_approved);
    }
}
