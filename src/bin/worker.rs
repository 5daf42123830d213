use detect_jobs::{
    config::AppConfig,
    routes::metrics::describe_metrics,
    services::{
        detector::HttpDetectorLoader,
        executor::{JobExecutor, RetryPolicy},
        inference::{InferenceService, LazyModel},
        queue::{JobStore, RedisJobStore},
        worker::Worker,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting detection worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Workers have no HTTP surface; expose metrics on their own listener.
    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        tracing::info!(%addr, "Serving worker metrics");
    }
    describe_metrics();

    tracing::info!(worker_id = %config.worker_id, "Connecting to Redis job store");
    let store: Arc<dyn JobStore> = Arc::new(
        RedisJobStore::new(&config.redis_url, &config.worker_id, config.result_ttl())
            .expect("Failed to initialize job store"),
    );

    // The model is loaded on the first job, then reused for every job.
    let loader =
        HttpDetectorLoader::new(&config.detector_url).expect("Failed to build detector client");
    let inference = InferenceService::new(LazyModel::new(loader), &config.results_dir);

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        delay: config.retry_delay(),
    };
    let executor = JobExecutor::new(inference, store.clone(), policy);
    let worker = Arc::new(Worker::new(store, executor, config.poll_interval()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown requested, finishing in-flight jobs");
        shutdown_tx.send(true).ok();
    });

    tracing::info!(
        concurrency = config.worker_concurrency,
        max_retries = policy.max_retries,
        "Worker ready, starting job processing loop"
    );
    worker.run(config.worker_concurrency, shutdown_rx).await;
    tracing::info!("Worker stopped");
}
