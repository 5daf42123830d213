use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::JobResult;
use crate::models::task::{TaskResponse, TaskSubmission};

/// Multipart field carrying one image; repeated once per file.
const FILES_FIELD: &str = "files";

/// POST /api/process — upload one or more images for detection.
///
/// Each file gets its own entry. A file that cannot be stored or enqueued is
/// reported as `ERROR` without affecting its siblings. A body that breaks off
/// mid-stream still returns the entries accepted before the break; only a
/// batch with nothing accepted is a 400.
pub async fn process_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Vec<TaskSubmission>>) {
    let mut tasks = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if tasks.is_empty() => {
                tracing::info!(error = %e, "Rejecting unparseable upload batch");
                return (StatusCode::BAD_REQUEST, Json(Vec::new()));
            }
            // Earlier files are already queued; report them.
            Err(e) => {
                tracing::info!(error = %e, accepted = tasks.len(), "Upload batch ended early");
                break;
            }
        };

        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let entry = match field.bytes().await {
            Ok(data) => submit_upload(&state, &file_name, &data).await,
            Err(e) if tasks.is_empty() => {
                tracing::info!(file_name = %file_name, error = %e, "Rejecting unparseable upload batch");
                return (StatusCode::BAD_REQUEST, Json(Vec::new()));
            }
            Err(e) => {
                tracing::info!(file_name = %file_name, error = %e, "Malformed upload part");
                // The stream is unusable past a broken part.
                tasks.push(TaskSubmission::rejected());
                break;
            }
        };
        tasks.push(entry);
    }

    if tasks.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(tasks));
    }
    (StatusCode::ACCEPTED, Json(tasks))
}

async fn submit_upload(state: &AppState, file_name: &str, data: &[u8]) -> TaskSubmission {
    let path = match state.uploads.save(file_name, data).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(file_name = %file_name, error = %e, "Failed to store upload");
            return TaskSubmission::rejected();
        }
    };

    match state.store.submit(&path.to_string_lossy()).await {
        Ok(job_id) => {
            metrics::counter!("detect_jobs_submitted_total").increment(1);
            tracing::info!(job_id = %job_id, path = %path.display(), "Detection job submitted");
            TaskSubmission::accepted(job_id)
        }
        Err(e) => {
            tracing::error!(file_name = %file_name, error = %e, "Failed to enqueue detection job");
            if let Err(e) = state.uploads.delete(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned upload");
            }
            TaskSubmission::rejected()
        }
    }
}

/// GET /api/result/{task_id} — job result; 202 until the job is terminal.
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<(StatusCode, Json<TaskResponse>), StatusCode> {
    let result = match Uuid::parse_str(&task_id) {
        Ok(job_id) => state.store.poll(job_id).await.map_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Result lookup failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?,
        // Not an identifier we could have issued; reads like any unknown id.
        Err(_) => JobResult::pending(),
    };

    let code = if result.status.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((code, Json(TaskResponse::from_result(&task_id, result))))
}

/// GET /api/status/{task_id} — status only, always 200.
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, StatusCode> {
    let status = match Uuid::parse_str(&task_id) {
        Ok(job_id) => state.store.status(job_id).await.map_err(|e| {
            tracing::error!(task_id = %task_id, error = %e, "Status lookup failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?,
        Err(_) => JobResult::pending().status,
    };

    Ok(Json(TaskResponse::status_only(&task_id, status)))
}
