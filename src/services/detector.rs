use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use crate::models::detection::Detection;
use crate::services::inference::{Detector, InferenceError, ModelLoader};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Loads an [`HttpDetector`] by fetching the class table of a model server.
pub struct HttpDetectorLoader {
    http: Client,
    endpoint: String,
}

/// Client for a detection model server.
///
/// The server exposes `GET /classes` (class names by index) and
/// `POST /detect` (base64 JPEG in, normalized boxes with class indices out).
pub struct HttpDetector {
    http: Client,
    endpoint: String,
    class_names: Vec<String>,
}

#[derive(Deserialize)]
struct ClassesResponse {
    names: Vec<String>,
}

#[derive(Serialize)]
struct DetectRequest {
    image: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    detections: Vec<RawDetection>,
}

#[derive(Deserialize)]
struct RawDetection {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    confidence: f32,
    class_id: usize,
}

impl HttpDetectorLoader {
    pub fn new(endpoint: &str) -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(InferenceError::Http)?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelLoader for HttpDetectorLoader {
    type Model = HttpDetector;

    async fn load(&self) -> Result<HttpDetector, InferenceError> {
        let url = format!("{}/classes", self.endpoint);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| InferenceError::Load(e.to_string()))?;

        let classes: ClassesResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Load(e.to_string()))?;

        if classes.names.is_empty() {
            return Err(InferenceError::Load(
                "model server reported no classes".to_string(),
            ));
        }

        tracing::info!(
            endpoint = %self.endpoint,
            classes = classes.names.len(),
            "Model server ready"
        );

        Ok(HttpDetector {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            class_names: classes.names,
        })
    }
}

impl HttpDetector {
    fn to_detection(&self, raw: RawDetection) -> Result<Detection, InferenceError> {
        let class_label = self
            .class_names
            .get(raw.class_id)
            .cloned()
            .ok_or_else(|| InferenceError::Model(format!("unknown class id {}", raw.class_id)))?;

        Ok(Detection {
            x: raw.x,
            y: raw.y,
            w: raw.w,
            h: raw.h,
            prob: raw.confidence,
            class_label,
        })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, InferenceError> {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .map_err(InferenceError::Encode)?;

        let request_body = DetectRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&jpeg),
        };

        let response = self
            .http
            .post(format!("{}/detect", self.endpoint))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Model(format!("{status}: {body}")));
        }

        let parsed: DetectResponse = response.json().await?;
        parsed
            .detections
            .into_iter()
            .map(|raw| self.to_detection(raw))
            .collect()
    }
}
