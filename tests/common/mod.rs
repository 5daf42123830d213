//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use detect_jobs::app_state::AppState;
use detect_jobs::models::detection::Detection;
use detect_jobs::models::job::{JobRecord, JobResult, QueuedJob};
use detect_jobs::routes;
use detect_jobs::services::executor::{JobExecutor, RetryPolicy};
use detect_jobs::services::inference::{Detector, InferenceError, InferenceService};
use detect_jobs::services::queue::{JobStore, QueueError};
use detect_jobs::services::storage::UploadStore;
use detect_jobs::services::worker::Worker;

pub const BOUNDARY: &str = "detect-jobs-test-boundary";

/// Detector returning a fixed detection list, failing the first `failures` calls.
pub struct StubDetector {
    pub detections: Vec<Detection>,
    pub failures: u32,
    pub calls: Arc<AtomicU32>,
}

impl StubDetector {
    pub fn returning(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            failures: 0,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            detections: Vec::new(),
            failures: u32::MAX,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Detector for StubDetector {
    async fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(InferenceError::Model("model server unavailable".into()));
        }
        Ok(self.detections.clone())
    }
}

/// Store whose every operation fails, as if Redis were down.
pub struct UnavailableStore;

fn unavailable() -> QueueError {
    QueueError::Redis(redis::RedisError::from(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}

#[async_trait]
impl JobStore for UnavailableStore {
    async fn submit(&self, _image_path: &str) -> Result<Uuid, QueueError> {
        Err(unavailable())
    }

    async fn record(&self, _job_id: Uuid) -> Result<Option<JobRecord>, QueueError> {
        Err(unavailable())
    }

    async fn claim(&self) -> Result<Option<QueuedJob>, QueueError> {
        Err(unavailable())
    }

    async fn record_retry(&self, _job_id: Uuid, _retries: u32) -> Result<(), QueueError> {
        Err(unavailable())
    }

    async fn complete(&self, _job: &QueuedJob, _result: &JobResult) -> Result<(), QueueError> {
        Err(unavailable())
    }

    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        Err(unavailable())
    }

    async fn queue_depth(&self) -> Result<u64, QueueError> {
        Err(unavailable())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Err(unavailable())
    }
}

pub fn person() -> Detection {
    Detection {
        x: 0.5,
        y: 0.5,
        w: 0.2,
        h: 0.4,
        prob: 0.91,
        class_label: "person".to_string(),
    }
}

/// Encoded PNG of a solid-color image.
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 200]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Multipart body with one `files` part per `(file_name, bytes)`.
pub fn multipart_body(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn build_test_app(store: Arc<dyn JobStore>, upload_dir: &Path) -> Router {
    let state = AppState::new(store, UploadStore::new(upload_dir));
    routes::api_router(state)
}

pub fn build_worker(
    store: Arc<dyn JobStore>,
    detector: StubDetector,
    results_dir: &Path,
    max_retries: u32,
) -> Worker<StubDetector> {
    let executor = JobExecutor::new(
        InferenceService::new(detector, results_dir),
        store.clone(),
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(1),
        },
    );
    Worker::new(store, executor, Duration::from_millis(5))
}

pub async fn post_files(app: Router, files: &[(&str, Vec<u8>)]) -> Response<Body> {
    post_multipart(app, multipart_body(files)).await
}

/// POST an already encoded multipart body to the process endpoint.
pub async fn post_multipart(app: Router, body: Vec<u8>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
