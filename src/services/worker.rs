use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::job::{JobResult, JobStatus, QueuedJob};
use crate::services::executor::JobExecutor;
use crate::services::inference::Detector;
use crate::services::queue::{JobStore, QueueError};

/// Attempts at writing a finished job before leaving it to in-flight recovery.
const COMPLETE_ATTEMPTS: u32 = 3;

/// Pulls jobs from the store and runs them to completion.
pub struct Worker<D> {
    store: Arc<dyn JobStore>,
    executor: Arc<JobExecutor<D>>,
    poll_interval: Duration,
}

impl<D: Detector + 'static> Worker<D> {
    pub fn new(store: Arc<dyn JobStore>, executor: JobExecutor<D>, poll_interval: Duration) -> Self {
        Self {
            store,
            executor: Arc::new(executor),
            poll_interval,
        }
    }

    /// Process the next job from the queue.
    /// Returns Ok(true) if a job was processed, Ok(false) if no job available.
    pub async fn process_next_job(&self) -> Result<bool, WorkerError> {
        let Some(job) = self.store.claim().await? else {
            return Ok(false);
        };

        tracing::info!(
            job_id = %job.job_id,
            image_path = %job.image_path,
            "Processing detection job"
        );

        let start = Instant::now();
        let result = self.executor.execute(&job).await;
        let elapsed = start.elapsed();
        metrics::histogram!("detect_job_processing_seconds").record(elapsed.as_secs_f64());

        match result.status {
            JobStatus::Success => metrics::counter!("detect_jobs_completed_total").increment(1),
            _ => metrics::counter!("detect_jobs_failed_total").increment(1),
        }

        self.complete(&job, &result).await?;

        tracing::info!(
            job_id = %job.job_id,
            status = %result.status,
            duration_ms = elapsed.as_millis(),
            "Job finished"
        );
        Ok(true)
    }

    /// Store the terminal result, retrying transient store errors.
    async fn complete(&self, job: &QueuedJob, result: &JobResult) -> Result<(), QueueError> {
        let mut attempt = 1;
        loop {
            match self.store.complete(job, result).await {
                Err(e @ QueueError::InvalidTransition(_)) => return Err(e),
                Err(e) if attempt < COMPLETE_ATTEMPTS => {
                    tracing::warn!(job_id = %job.job_id, attempt, error = %e, "Failed to store job result, retrying");
                    attempt += 1;
                    sleep(self.poll_interval).await;
                }
                other => return other,
            }
        }
    }

    /// Run one worker slot until `shutdown` flips to true.
    ///
    /// A running job is always finished before the slot exits.
    pub async fn run_slot(&self, slot: usize, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(slot, "Worker slot started");
        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let idle = match self.process_next_job().await {
                Ok(true) => {
                    tracing::debug!(slot, "Job processed, checking for next job");
                    false
                }
                Ok(false) => {
                    tracing::trace!(slot, "No jobs available, sleeping");
                    if let Ok(depth) = self.store.queue_depth().await {
                        metrics::gauge!("detect_queue_depth").set(depth as f64);
                    }
                    true
                }
                Err(e) => {
                    tracing::error!(slot, error = %e, "Error processing job, will retry");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
        tracing::info!(slot, "Worker slot stopped");
    }

    /// Re-queue stranded jobs, then run `concurrency` slots until shutdown.
    pub async fn run(self: Arc<Self>, concurrency: usize, shutdown: watch::Receiver<bool>) {
        match self.store.recover_in_flight().await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(recovered = n, "Re-queued jobs left in flight by a previous run"),
            Err(e) => tracing::error!(error = %e, "Failed to recover in-flight jobs"),
        }

        let mut slots = tokio::task::JoinSet::new();
        for slot in 0..concurrency.max(1) {
            let worker = self.clone();
            let shutdown = shutdown.clone();
            slots.spawn(async move { worker.run_slot(slot, shutdown).await });
        }
        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker slot panicked");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}
