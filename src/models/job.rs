use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::detection::Prediction;

/// Diagnostic stored when a job exhausts its retry budget.
pub const MAX_RETRIES_EXCEEDED: &str = "max retried achieved";

/// Lifecycle state of a detection job.
///
/// Transitions only move forward: `Pending -> Processing -> {Success, Fail}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Success,
    Fail,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Fail)
    }

    pub(crate) fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Success | JobStatus::Fail => 2,
        }
    }

    /// Whether a record in state `self` may be overwritten by one in `next`.
    ///
    /// Terminal records are written once; non-terminal records may be refreshed
    /// in place (e.g. a retry count update while `Processing`).
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// Payload of a job as it travels through the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedJob {
    pub job_id: Uuid,
    pub image_path: String,
    pub submitted_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            image_path: image_path.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Result payload of a job: detections on success, a diagnostic on failure,
/// empty while the job is still running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum JobOutput {
    Prediction(Prediction),
    Message(String),
}

impl JobOutput {
    pub fn empty() -> Self {
        JobOutput::Message(String::new())
    }
}

impl Default for JobOutput {
    fn default() -> Self {
        Self::empty()
    }
}

/// Status and result of a job as observed by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub status: JobStatus,
    pub result: JobOutput,
}

impl JobResult {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            result: JobOutput::empty(),
        }
    }

    pub fn success(prediction: Prediction) -> Self {
        Self {
            status: JobStatus::Success,
            result: JobOutput::Prediction(prediction),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Fail,
            result: JobOutput::Message(reason.into()),
        }
    }
}

/// Persisted state of a job in the result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub image_path: String,
    #[serde(default)]
    pub result: JobOutput,
    pub retries: u32,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn pending(job: &QueuedJob) -> Self {
        Self {
            job_id: job.job_id,
            status: JobStatus::Pending,
            image_path: job.image_path.clone(),
            result: JobOutput::empty(),
            retries: 0,
            submitted_at: job.submitted_at,
            updated_at: Utc::now(),
        }
    }

    /// Copy of this record moved to `status`.
    pub fn with_status(&self, status: JobStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn with_result(&self, result: &JobResult) -> Self {
        Self {
            status: result.status,
            result: result.result.clone(),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn to_result(&self) -> JobResult {
        JobResult {
            status: self.status,
            result: self.result.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(JobStatus::Pending.to_string(), "PENDING");
        assert_eq!(JobStatus::Fail.to_string(), "FAIL");
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
        assert_eq!("SUCCESS".parse::<JobStatus>().unwrap(), JobStatus::Success);
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Fail));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Success.can_transition_to(JobStatus::Fail));
        assert!(!JobStatus::Fail.can_transition_to(JobStatus::Fail));
    }

    #[test]
    fn test_empty_output_serializes_as_empty_string() {
        let json = serde_json::to_value(JobResult::pending()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["result"], "");
    }

    #[test]
    fn test_fail_output_carries_diagnostic() {
        let json = serde_json::to_value(JobResult::fail(MAX_RETRIES_EXCEEDED)).unwrap();
        assert_eq!(json["result"], "max retried achieved");
    }
}
