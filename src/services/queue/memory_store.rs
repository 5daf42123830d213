use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use super::{JobStore, QueueError};
use crate::models::job::{JobRecord, JobResult, JobStatus, QueuedJob};

#[derive(Default)]
struct Inner {
    queue: VecDeque<QueuedJob>,
    in_flight: Vec<QueuedJob>,
    records: HashMap<Uuid, JobRecord>,
}

impl Inner {
    fn write(&mut self, record: JobRecord) -> Result<(), QueueError> {
        if let Some(current) = self.records.get(&record.job_id) {
            if !current.status.can_transition_to(record.status) {
                return Err(QueueError::InvalidTransition(record.job_id));
            }
        }
        self.records.insert(record.job_id, record);
        Ok(())
    }
}

/// Process-local job store.
///
/// Gives the same guarantees as [`super::RedisJobStore`] to everything
/// sharing one instance, without surviving a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of jobs currently claimed and not yet completed.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn submit(&self, image_path: &str) -> Result<Uuid, QueueError> {
        let job = QueuedJob::new(image_path);
        let mut inner = self.lock();
        inner.write(JobRecord::pending(&job))?;
        let job_id = job.job_id;
        inner.queue.push_back(job);
        Ok(job_id)
    }

    async fn record(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.lock().records.get(&job_id).cloned())
    }

    async fn claim(&self) -> Result<Option<QueuedJob>, QueueError> {
        let mut inner = self.lock();
        while let Some(job) = inner.queue.pop_front() {
            let record = inner
                .records
                .get(&job.job_id)
                .cloned()
                .unwrap_or_else(|| JobRecord::pending(&job));
            match inner.write(record.with_status(JobStatus::Processing)) {
                Ok(()) => {
                    inner.in_flight.push(job.clone());
                    return Ok(Some(job));
                }
                Err(QueueError::InvalidTransition(_)) => {
                    tracing::info!(job_id = %job.job_id, "Skipping job that is already terminal");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn record_retry(&self, job_id: Uuid, retries: u32) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let Some(record) = inner.records.get(&job_id).cloned() else {
            tracing::warn!(job_id = %job_id, "Retry recorded for a job without a record");
            return Ok(());
        };

        let mut updated = record.with_status(JobStatus::Processing);
        updated.retries = retries;
        inner.write(updated)
    }

    async fn complete(&self, job: &QueuedJob, result: &JobResult) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let record = inner
            .records
            .get(&job.job_id)
            .cloned()
            .unwrap_or_else(|| JobRecord::pending(job));
        let written = inner.write(record.with_result(result));

        if let Some(pos) = inner.in_flight.iter().position(|j| j.job_id == job.job_id) {
            inner.in_flight.remove(pos);
        }
        written
    }

    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        let mut inner = self.lock();
        let stranded: Vec<QueuedJob> = inner.in_flight.drain(..).collect();
        let count = stranded.len();
        for job in stranded.into_iter().rev() {
            inner.queue.push_front(job);
        }
        Ok(count)
    }

    async fn queue_depth(&self) -> Result<u64, QueueError> {
        Ok(self.lock().queue.len() as u64)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
