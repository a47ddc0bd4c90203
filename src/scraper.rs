//! Client for the external scraping task-queue service
//!
//! Submit a scraper config, get a task id, poll for completion. One
//! `reqwest::Client` is reused for connection pooling. Submissions retry on
//! transient failures with a fixed 2 s delay; individual status polls retry
//! with a fixed 1 s delay. 4xx responses are terminal.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::ai::retry::{retry_with_backoff, RetryConfig};
use crate::config::{JobSpyConfig, ScraperSiteConfig};
use crate::errors::ScraperError;
use crate::orchestrator::StopSignal;

/// Terminal states reported by `GET /status/{task_id}`
#[derive(Debug, Clone, PartialEq)]
enum TaskStatus {
    Pending,
    Completed(Vec<Value>),
    Failed(String),
}

pub struct ScraperClient {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    job_timeout: Duration,
    request_timeout: Duration,
}

fn is_retryable(error: &ScraperError) -> bool {
    matches!(
        error,
        ScraperError::NetworkError(_) | ScraperError::ServerError(_, _) | ScraperError::Timeout(_)
    )
}

impl ScraperClient {
    pub fn new(config: &JobSpyConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ScraperError::NetworkError(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            job_timeout: Duration::from_secs(config.job_timeout_seconds),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    /// Submit a scraping job. Retries 3 attempts with a 2 s fixed delay on
    /// timeout/5xx/connection errors; 4xx raises immediately.
    pub async fn submit(&self, scraper_cfg: &ScraperSiteConfig) -> Result<String, ScraperError> {
        let site_name = scraper_cfg
            .site_type
            .first()
            .map(String::as_str)
            .unwrap_or("unknown");
        log::info!("Submitting scrape job for {}", site_name);

        let task_id = retry_with_backoff(
            || self.submit_once(scraper_cfg),
            RetryConfig::fixed(3, 2000),
            is_retryable,
        )
        .await?;

        log::info!("Scrape job submitted for {}: task_id={}", site_name, task_id);
        Ok(task_id)
    }

    async fn submit_once(&self, scraper_cfg: &ScraperSiteConfig) -> Result<String, ScraperError> {
        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .timeout(self.request_timeout)
            .json(scraper_cfg)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::ClientError(status.as_u16(), body));
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScraperError::ServerError(status.as_u16(), body));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScraperError::NetworkError(format!("invalid submit response: {}", e)))?;

        payload
            .get("task_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ScraperError::NetworkError("submit response missing task_id".to_string())
            })
    }

    /// Poll until the task completes, fails, times out, or the stop signal
    /// fires. Returns the scraped jobs on completion, `None` otherwise.
    pub async fn wait_for_result(
        &self,
        task_id: &str,
        stop: &StopSignal,
    ) -> Result<Option<Vec<Value>>, ScraperError> {
        let started = Instant::now();

        loop {
            if stop.is_set() {
                log::info!("Polling cancelled for task {}", task_id);
                return Ok(None);
            }

            match self.poll_status_with_retry(task_id).await {
                Ok(TaskStatus::Completed(jobs)) => {
                    log::info!("Task {} completed. Found {} jobs.", task_id, jobs.len());
                    return Ok(Some(jobs));
                }
                Ok(TaskStatus::Failed(error)) => {
                    log::error!("Task {} failed: {}", task_id, error);
                    return Ok(None);
                }
                Ok(TaskStatus::Pending) => {}
                Err(e) => {
                    // Poll errors are logged and absorbed; the wall clock
                    // decides when to give up.
                    log::warn!("Polling error for {}: {}", task_id, e);
                }
            }

            if started.elapsed() >= self.job_timeout {
                log::warn!("Timeout waiting for task {}", task_id);
                return Ok(None);
            }

            stop.wait(self.poll_interval).await;
        }
    }

    async fn poll_status_with_retry(&self, task_id: &str) -> Result<TaskStatus, ScraperError> {
        retry_with_backoff(
            || self.poll_status_once(task_id),
            RetryConfig::fixed(3, 1000),
            is_retryable,
        )
        .await
    }

    async fn poll_status_once(&self, task_id: &str) -> Result<TaskStatus, ScraperError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.base_url, task_id))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ScraperError::ClientError(
                404,
                format!("task {} not found", task_id),
            ));
        }
        if status.is_server_error() {
            return Err(ScraperError::ServerError(status.as_u16(), String::new()));
        }
        if !status.is_success() {
            return Ok(TaskStatus::Pending);
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ScraperError::NetworkError(format!("invalid status response: {}", e)))?;

        match payload.get("status").and_then(|v| v.as_str()) {
            Some("completed") => {
                let data = payload
                    .get("data")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default();
                Ok(TaskStatus::Completed(data))
            }
            Some("failed") => Ok(TaskStatus::Failed(
                payload
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error")
                    .to_string(),
            )),
            _ => Ok(TaskStatus::Pending),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ScraperError {
    if e.is_timeout() {
        ScraperError::Timeout(e.to_string())
    } else {
        ScraperError::NetworkError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_predicate_separates_transient_from_terminal() {
        assert!(is_retryable(&ScraperError::NetworkError("x".to_string())));
        assert!(is_retryable(&ScraperError::ServerError(502, String::new())));
        assert!(is_retryable(&ScraperError::Timeout("x".to_string())));
        assert!(!is_retryable(&ScraperError::ClientError(422, String::new())));
        assert!(!is_retryable(&ScraperError::TaskFailed("x".to_string())));
        assert!(!is_retryable(&ScraperError::Cancelled));
    }

    #[test]
    fn client_builds_from_config() {
        let cfg = JobSpyConfig {
            url: "http://localhost:8000/".to_string(),
            poll_interval_seconds: 1,
            job_timeout_seconds: 5,
            request_timeout_seconds: 2,
        };
        let client = ScraperClient::new(&cfg).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000");
        assert_eq!(client.poll_interval, Duration::from_secs(1));
    }
}
