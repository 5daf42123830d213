//! Inference capability: image bytes in, detections and an annotated
//! artifact out.
//!
//! The model itself sits behind [`Detector`]. [`LazyModel`] loads it on first
//! use and keeps it for the lifetime of the worker; [`InferenceService`] wraps
//! any detector with decoding, validation and artifact rendering.

use async_trait::async_trait;
use garde::Validate;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::PathBuf;
use tokio::sync::OnceCell;

use crate::models::detection::{Detection, Prediction};
use crate::services::annotate;

/// A loaded detection model.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError>;
}

/// Builds a [`Detector`]; called at most once per successful load.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    type Model: Detector;

    async fn load(&self) -> Result<Self::Model, InferenceError>;
}

/// Detector that loads its model on first use and caches it.
///
/// Concurrent first callers wait on a single load. A failed load is not
/// cached, so the next call tries again.
pub struct LazyModel<L: ModelLoader> {
    loader: L,
    model: OnceCell<L::Model>,
}

impl<L: ModelLoader> LazyModel<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<&L::Model, InferenceError> {
        self.model
            .get_or_try_init(|| async {
                tracing::info!("Loading detection model");
                let start = std::time::Instant::now();
                let model = self.loader.load().await?;
                tracing::info!(load_ms = start.elapsed().as_millis(), "Detection model loaded");
                Ok::<_, InferenceError>(model)
            })
            .await
    }
}

#[async_trait]
impl<L: ModelLoader> Detector for LazyModel<L> {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError> {
        self.model().await?.detect(image).await
    }
}

/// Runs a detector over raw upload bytes and renders the annotated result.
pub struct InferenceService<D> {
    detector: D,
    results_dir: PathBuf,
}

impl<D: Detector> InferenceService<D> {
    pub fn new(detector: D, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            detector,
            results_dir: results_dir.into(),
        }
    }

    /// Detect objects in `image_bytes`.
    ///
    /// The annotated image is written to `{results_dir}/{artifact_stem}.jpg`
    /// and referenced as `static/{artifact_stem}.jpg` in the prediction.
    pub async fn predict(
        &self,
        image_bytes: &[u8],
        artifact_stem: &str,
    ) -> Result<Prediction, InferenceError> {
        let image = image::load_from_memory(image_bytes).map_err(InferenceError::Decode)?;

        let detections = self.detector.detect(&image).await?;
        for detection in &detections {
            detection
                .validate()
                .map_err(|e| InferenceError::InvalidDetection(e.to_string()))?;
        }

        let annotated = annotate::draw_detections(&image, &detections);
        let mut encoded = Vec::new();
        annotated
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
            .map_err(InferenceError::Encode)?;

        let file_name = format!("{artifact_stem}.jpg");
        tokio::fs::create_dir_all(&self.results_dir).await?;
        tokio::fs::write(self.results_dir.join(&file_name), encoded).await?;

        Ok(Prediction {
            file_name: format!("static/{file_name}"),
            bbox: detections,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Model failed to load: {0}")]
    Load(String),

    #[error("Model server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model returned an error: {0}")]
    Model(String),

    #[error("Model returned an invalid detection: {0}")]
    InvalidDetection(String),

    #[error("Failed to encode annotated image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to write annotated image: {0}")]
    Artifact(#[from] std::io::Error),
}

impl InferenceError {
    /// Whether another attempt on the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Load(_)
            | InferenceError::Http(_)
            | InferenceError::Model(_)
            | InferenceError::Artifact(_) => true,
            InferenceError::Decode(_)
            | InferenceError::InvalidDetection(_)
            | InferenceError::Encode(_) => false,
        }
    }
}

/// Outcome of one inference attempt, as seen by the executor.
#[derive(Debug)]
pub enum InferenceOutcome<T> {
    Ok(T),
    Retry(String),
    Fail(String),
}

impl<T> From<Result<T, InferenceError>> for InferenceOutcome<T> {
    fn from(result: Result<T, InferenceError>) -> Self {
        match result {
            Ok(value) => InferenceOutcome::Ok(value),
            Err(e) if e.is_retryable() => InferenceOutcome::Retry(e.to_string()),
            Err(e) => InferenceOutcome::Fail(e.to_string()),
        }
    }
}
