//! Job queue and result store.
//!
//! A [`JobStore`] is both the mailbox workers pull jobs from and the single
//! source of truth for job status. [`RedisJobStore`] is shared by the API and
//! any number of worker processes; [`MemoryJobStore`] serves a single process.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::job::{JobRecord, JobResult, JobStatus, QueuedJob};

mod memory_store;
mod redis_store;

pub use memory_store::MemoryJobStore;
pub use redis_store::RedisJobStore;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record a new `PENDING` job and push it onto the queue.
    ///
    /// Returns as soon as the job is enqueued; never waits on execution.
    async fn submit(&self, image_path: &str) -> Result<Uuid, QueueError>;

    /// Stored record for a job, if the store has ever seen it.
    async fn record(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError>;

    /// Take the next pending job, move it in flight and mark it `PROCESSING`.
    async fn claim(&self) -> Result<Option<QueuedJob>, QueueError>;

    /// Persist the number of retries performed so far for an in-flight job.
    async fn record_retry(&self, job_id: Uuid, retries: u32) -> Result<(), QueueError>;

    /// Write the terminal record and release the in-flight slot.
    async fn complete(&self, job: &QueuedJob, result: &JobResult) -> Result<(), QueueError>;

    /// Re-queue jobs left in flight by a previous run of this worker.
    async fn recover_in_flight(&self) -> Result<usize, QueueError>;

    /// Number of jobs waiting to be claimed.
    async fn queue_depth(&self) -> Result<u64, QueueError>;

    /// Check backend connectivity (for health checks).
    async fn health_check(&self) -> Result<(), QueueError>;

    /// Non-blocking status lookup.
    ///
    /// Identifiers the store has never seen read as `PENDING`, the same as a
    /// job that has not started yet.
    async fn poll(&self, job_id: Uuid) -> Result<JobResult, QueueError> {
        Ok(self
            .record(job_id)
            .await?
            .map(|record| record.to_result())
            .unwrap_or_else(JobResult::pending))
    }

    /// Status-only lookup, with the same unknown-as-`PENDING` rule as [`poll`].
    ///
    /// [`poll`]: JobStore::poll
    async fn status(&self, job_id: Uuid) -> Result<JobStatus, QueueError> {
        Ok(self
            .record(job_id)
            .await?
            .map(|record| record.status)
            .unwrap_or(JobStatus::Pending))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Job {0} is not in a state that accepts this update")]
    InvalidTransition(Uuid),
}
