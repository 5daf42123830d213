use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for every metric the API and workers emit.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "detect_jobs_submitted_total",
        "Total detection jobs submitted"
    );
    metrics::describe_counter!(
        "detect_jobs_completed_total",
        "Total detection jobs that finished with SUCCESS"
    );
    metrics::describe_counter!(
        "detect_jobs_failed_total",
        "Total detection jobs that finished with FAIL"
    );
    metrics::describe_counter!(
        "detect_jobs_retries_total",
        "Total inference attempts retried after a failure"
    );
    metrics::describe_histogram!(
        "detect_job_processing_seconds",
        "Time from claim to terminal result for one job"
    );
    metrics::describe_gauge!(
        "detect_queue_depth",
        "Current number of jobs waiting to be claimed"
    );
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
