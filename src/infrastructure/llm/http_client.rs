use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

use crate::domain::DomainError;

const DEFAULT_LABEL: &str = "http";

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;
}

/// Real HTTP client using reqwest.
///
/// Failures are classified so callers can decide on retries: 429 becomes
/// `RateLimited` (with the `Retry-After` hint), 5xx and transport errors
/// become `Network`, client timeouts become `Timeout`, other statuses are
/// final `Provider` errors.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    label: String,
    timeout_ms: u64,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            label: DEFAULT_LABEL.to_string(),
            timeout_ms: 0,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            label: DEFAULT_LABEL.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// Provider name used in error values
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn classify_send_error(&self, error: reqwest::Error) -> DomainError {
        if error.is_timeout() {
            DomainError::timeout(&self.label, self.timeout_ms)
        } else {
            DomainError::network(&self.label, format!("Request failed: {}", error))
        }
    }

    fn classify_status(
        &self,
        status: StatusCode,
        retry_after: Option<u64>,
        body: String,
    ) -> DomainError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            DomainError::rate_limited(&self.label, retry_after)
        } else if status.is_server_error() {
            DomainError::network(&self.label, format!("HTTP {}: {}", status, body))
        } else {
            DomainError::provider(&self.label, format!("HTTP {}: {}", status, body))
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `Retry-After` in delta-seconds form, as milliseconds
fn parse_retry_after(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some((seconds * 1000.0) as u64)
    } else {
        None
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_body = response.text().await.unwrap_or_default();
            return Err(self.classify_status(status, retry_after, error_body));
        }

        response.json().await.map_err(|e| {
            DomainError::provider(&self.label, format!("Failed to parse response: {}", e))
        })
    }
}
