use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::models::job::{JobResult, QueuedJob, MAX_RETRIES_EXCEEDED};
use crate::services::inference::{Detector, InferenceOutcome, InferenceService};
use crate::services::queue::JobStore;

/// Bounded retry with a constant delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a job runs at most `max_retries + 1` times.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Runs one job to a terminal result.
///
/// Holds a single inference service for every job it executes; share it
/// across worker slots with an `Arc`.
pub struct JobExecutor<D> {
    inference: InferenceService<D>,
    store: Arc<dyn JobStore>,
    policy: RetryPolicy,
}

impl<D: Detector> JobExecutor<D> {
    pub fn new(inference: InferenceService<D>, store: Arc<dyn JobStore>, policy: RetryPolicy) -> Self {
        Self {
            inference,
            store,
            policy,
        }
    }

    /// Execute `job`, retrying retryable inference failures.
    ///
    /// Never returns an error: every failure becomes a `FAIL` result.
    pub async fn execute(&self, job: &QueuedJob) -> JobResult {
        let image_bytes = match tokio::fs::read(&job.image_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(job_id = %job.job_id, path = %job.image_path, error = %e, "Job payload unreadable");
                return JobResult::fail(format!("invalid payload: {e}"));
            }
        };

        let stem = artifact_stem(job);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = InferenceOutcome::from(self.inference.predict(&image_bytes, &stem).await);
            match outcome {
                InferenceOutcome::Ok(prediction) => {
                    tracing::debug!(
                        job_id = %job.job_id,
                        attempt,
                        detections = prediction.bbox.len(),
                        "Inference succeeded"
                    );
                    return JobResult::success(prediction);
                }
                InferenceOutcome::Fail(reason) => {
                    tracing::warn!(job_id = %job.job_id, attempt, reason = %reason, "Inference failed permanently");
                    return JobResult::fail(reason);
                }
                InferenceOutcome::Retry(reason) => {
                    if attempt > self.policy.max_retries {
                        tracing::warn!(
                            job_id = %job.job_id,
                            attempts = attempt,
                            reason = %reason,
                            "Job failed after max retries"
                        );
                        return JobResult::fail(MAX_RETRIES_EXCEEDED);
                    }

                    tracing::info!(
                        job_id = %job.job_id,
                        retry = attempt,
                        delay_ms = self.policy.delay.as_millis(),
                        reason = %reason,
                        "Inference failed, retrying"
                    );
                    metrics::counter!("detect_jobs_retries_total").increment(1);

                    if let Err(e) = self.store.record_retry(job.job_id, attempt).await {
                        tracing::warn!(job_id = %job.job_id, error = %e, "Failed to record retry count");
                    }
                    sleep(self.policy.delay).await;
                }
            }
        }
    }
}

/// Artifact name for a job: the upload's file stem, or the job id.
fn artifact_stem(job: &QueuedJob) -> String {
    Path::new(&job.image_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| job.job_id.simple().to_string())
}
