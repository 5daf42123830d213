use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{JobOutput, JobResult, JobStatus};

/// Status of one file in a `POST /api/process` batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Processing,
    Error,
}

/// Batch entry returned for each uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_id: String,
    pub status: SubmissionStatus,
    pub url_result: String,
}

impl TaskSubmission {
    pub fn accepted(job_id: Uuid) -> Self {
        Self {
            task_id: job_id.to_string(),
            status: SubmissionStatus::Processing,
            url_result: format!("/api/result/{job_id}"),
        }
    }

    pub fn rejected() -> Self {
        Self {
            task_id: String::new(),
            status: SubmissionStatus::Error,
            url_result: String::new(),
        }
    }
}

/// Response body of the result and status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: JobStatus,
    pub result: JobOutput,
}

impl TaskResponse {
    pub fn from_result(task_id: &str, job: JobResult) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: job.status,
            result: job.result,
        }
    }

    /// Status-only view; the result is always empty.
    pub fn status_only(task_id: &str, status: JobStatus) -> Self {
        Self {
            task_id: task_id.to_string(),
            status,
            result: JobOutput::empty(),
        }
    }
}
