use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod jobs;
pub mod metrics;

/// Job submission, query and health routes.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/process", post(jobs::process_images))
        .route("/api/result/{task_id}", get(jobs::get_result))
        .route("/api/status/{task_id}", get(jobs::get_status))
        .with_state(state)
}
