//! Test helper utilities for E2E testing

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// Entry returned by POST /api/process
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_id: String,
    pub status: String,
    pub url_result: String,
}

/// Response from GET /api/result/{task_id} and /api/status/{task_id}
#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: String,
    pub result: serde_json::Value,
}

/// Upload a batch of in-memory images to the process endpoint
pub async fn upload_images(
    client: &reqwest::Client,
    base_url: &str,
    files: Vec<(String, Vec<u8>)>,
) -> Result<Vec<TaskSubmission>, Box<dyn std::error::Error>> {
    let mut form = multipart::Form::new();
    for (name, bytes) in files {
        form = form.part(
            "files",
            multipart::Part::bytes(bytes)
                .file_name(name)
                .mime_str("image/png")?,
        );
    }

    let response = client
        .post(format!("{}/api/process", base_url))
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    if status != reqwest::StatusCode::ACCEPTED {
        let error_text = response.text().await?;
        return Err(format!("Upload failed with status {}: {}", status, error_text).into());
    }

    Ok(response.json::<Vec<TaskSubmission>>().await?)
}

/// Poll the result endpoint until the job is terminal (with timeout)
pub async fn poll_result(
    client: &reqwest::Client,
    base_url: &str,
    url_result: &str,
    timeout_secs: u64,
) -> Result<TaskResponse, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client.get(format!("{}{}", base_url, url_result)).send().await?;
        let code = response.status();
        let body = response.json::<TaskResponse>().await?;

        match code {
            reqwest::StatusCode::OK => return Ok(body),
            reqwest::StatusCode::ACCEPTED => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still {} (attempt {}/{})", body.status, attempt, max_attempts);
                }
                sleep(Duration::from_millis(500)).await;
            }
            other => return Err(format!("Unexpected status code {}", other).into()),
        }
    }

    Err(format!("Job did not complete within {} seconds", timeout_secs).into())
}
