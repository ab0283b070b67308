//! Detached worker pool.

use std::future::Future;
use std::sync::Arc;
use mission_core::MissionId;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// Job ID type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID
    pub fn new() -> Self {
        Self(format!("job_{}", ulid::Ulid::new()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A submitted job. Dropping the handle detaches the job; it keeps running.
#[derive(Debug)]
pub struct JobHandle<T> {
    /// Job id
    pub id: JobId,
    /// Mission the job works on
    pub mission_id: MissionId,
    handle: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    /// Wait for the job's report.
    pub async fn wait(self) -> Result<T> {
        Ok(self.handle.await?)
    }

    /// Whether the job has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns each job on its own tokio task, optionally capping how many run at
/// once.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    limit: Option<Arc<Semaphore>>,
}

impl WorkerPool {
    /// Create a pool. `None` or `Some(0)` means unbounded.
    pub fn new(max_concurrent: Option<usize>) -> Self {
        Self {
            limit: max_concurrent
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Free worker slots, if bounded.
    pub fn available(&self) -> Option<usize> {
        self.limit.as_ref().map(|s| s.available_permits())
    }

    /// Submit work for a mission.
    pub fn submit<F, T>(&self, mission_id: MissionId, work: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = JobId::new();
        let limit = self.limit.clone();
        let job = id.clone();
        let mission = mission_id.clone();

        let handle = tokio::spawn(async move {
            // held until the work completes; None when unbounded or closed
            let _permit = match limit {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            debug!("Job {} started for mission {}", job, mission);
            work.await
        });

        JobHandle {
            id,
            mission_id,
            handle,
        }
    }
}
