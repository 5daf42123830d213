use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000"). Unused by worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Redis connection string for the job queue and result store
    pub redis_url: String,

    /// Directory holding uploaded originals
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory holding annotated results, served under `/static`
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Base URL of the detection model server
    #[serde(default = "default_detector_url")]
    pub detector_url: String,

    /// Retries after the first failed inference attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Constant delay between inference attempts
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Worker sleep when the queue is empty
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Concurrent job slots per worker process
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Stable worker name; keys this worker's in-flight list
    #[serde(default = "default_worker_id")]
    pub worker_id: String,

    /// Expiry for job records. Unset keeps records forever.
    #[serde(default)]
    pub result_ttl_secs: Option<u64>,

    /// Prometheus listener for worker processes (e.g. "0.0.0.0:9100")
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,

    /// Request body limit for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("static/results")
}

fn default_detector_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_worker_concurrency() -> usize {
    1
}

fn default_worker_id() -> String {
    "worker-1".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn result_ttl(&self) -> Option<Duration> {
        self.result_ttl_secs.map(Duration::from_secs)
    }
}
