//! HTTP layer: bounded-retry request execution and classification of backend
//! replies into a tagged result the rest of the client can branch on.

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("unsupported file: {0}")]
    UnsupportedFile(String),
    #[error("workflow error: {0}")]
    Workflow(String),
}

/// Classified backend reply. Service-level errors arrive as a structured JSON
/// payload carrying an `errorMessage` code and are not transport failures:
/// callers branch on this variant instead of inspecting payload keys.
#[derive(Debug, Clone)]
pub enum ServiceReply {
    /// Successful JSON payload.
    Json(Value),
    /// Successful non-JSON payload (presigned URLs come back as plain text).
    Text(String),
    /// Structured error payload from the backend.
    ServiceError { code: String, payload: Value },
}

impl ServiceReply {
    pub fn service_error_code(&self) -> Option<&str> {
        match self {
            ServiceReply::ServiceError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The payload regardless of outcome, for display purposes.
    pub fn into_value(self) -> Value {
        match self {
            ServiceReply::Json(v) => v,
            ServiceReply::Text(t) => Value::String(t),
            ServiceReply::ServiceError { payload, .. } => payload,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ServiceReply::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Bounded exponential backoff for transient connection failures. The same
/// policy shape drives the protection polling loop configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 6, max_elapsed: Duration::from_secs(30), base_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(Duration::from_secs(10))
    }

    pub fn allows_retry(&self, attempt: u32, started: Instant) -> bool {
        attempt + 1 < self.max_attempts && started.elapsed() < self.max_elapsed
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Classify a received body. JSON payloads carrying an `errorMessage` field
/// are service errors even when the HTTP status is an error; any other
/// non-success status is a transport failure.
pub fn classify_reply(status: StatusCode, content_type: &str, body: String) -> Result<ServiceReply, ApiError> {
    if content_type.starts_with("application/json") {
        if let Ok(value) = serde_json::from_str::<Value>(&body) {
            if let Some(code) = value.get("errorMessage") {
                let code = code.as_str().map(str::to_string).unwrap_or_else(|| code.to_string());
                return Ok(ServiceReply::ServiceError { code, payload: value });
            }
            if status.is_success() {
                return Ok(ServiceReply::Json(value));
            }
        }
    }
    if !status.is_success() {
        return Err(ApiError::Transport(format!("request failed with status {status}")));
    }
    Ok(ServiceReply::Text(body))
}

pub struct Transport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Transport {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { client: reqwest::Client::new(), retry }
    }

    /// Issue a request, retrying connection-level failures with exponential
    /// backoff. HTTP error statuses and service error payloads are never
    /// retried; they are classified and handed to the caller.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<ServiceReply, ApiError> {
        let response = self
            .send_with_retry(|| {
                let mut rb = self.client.request(method.clone(), url).headers(headers.clone());
                if !query.is_empty() {
                    rb = rb.query(query);
                }
                if let Some(b) = body {
                    rb = rb.json(b);
                }
                rb
            })
            .await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response body: {e}")))?;
        classify_reply(status, &content_type, text)
    }

    /// PUT one upload part to its presigned URL and return the entity tag.
    pub async fn put_part(&self, url: &str, data: Vec<u8>) -> Result<String, ApiError> {
        let response = self.send_with_retry(|| self.client.put(url).body(data.clone())).await?;
        if !response.status().is_success() {
            return Err(ApiError::Transport(format!("part upload failed with status {}", response.status())));
        }
        response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::Transport("part upload response is missing ETag".into()))
    }

    /// GET a (presigned) URL for streamed download.
    pub async fn download(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let response = self.send_with_retry(|| self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(ApiError::Transport(format!("download failed with status {}", response.status())));
        }
        Ok(response)
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if is_transient(&e) && self.retry.allows_retry(attempt, started) => {
                    let delay = self.retry.backoff_delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "transport.retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "transport.giving_up");
                    return Err(ApiError::Transport(e.to_string()));
                }
            }
        }
    }
}
