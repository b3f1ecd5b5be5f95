//! Resilient completion client: rate limiting, per-call timeout and retries
//! around an [`LlmProvider`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use super::retry::RetryConfig;
use crate::domain::{
    CompletionRequest, DomainError, LlmProvider, LlmRequest, LlmResponseFormat, TextCompletion,
};
use crate::infrastructure::observability::{record_llm_request, record_llm_retry};

/// Model-call collaborator used by the generator, engine and model grader
#[derive(Debug, Clone)]
pub struct CompletionClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_timeout: Duration,
    retry: RetryConfig,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl CompletionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            rate_limiter: None,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Same provider, limiter and policies, different model
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &CompletionRequest) -> LlmRequest {
        let mut builder = LlmRequest::builder();

        if let Some(ref system) = request.system {
            builder = builder.system(system.clone());
        }

        builder = builder
            .user(request.prompt.clone())
            .temperature(request.temperature);

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        if request.json_mode {
            builder = builder.response_format(LlmResponseFormat::JsonObject);
        }

        builder.build()
    }

    /// One attempt: wait for a limiter slot, then the provider call under a
    /// timeout
    async fn attempt(&self, request: &LlmRequest) -> Result<String, DomainError> {
        let provider_name = self.provider.provider_name();

        if let Some(ref limiter) = self.rate_limiter {
            let waited = limiter.until_ready().await;
            if !waited.is_zero() {
                debug!(
                    model = %self.model,
                    waited_ms = waited.as_millis() as u64,
                    "Held back by the request limiter"
                );
            }
        }

        let future = self.provider.chat(&self.model, request.clone());
        let response = match timeout(self.request_timeout, future).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DomainError::timeout(
                    provider_name,
                    self.request_timeout.as_millis() as u64,
                ));
            }
        };

        if response.is_truncated() {
            warn!(
                model = %self.model,
                completion_tokens = response.usage.map(|u| u.completion_tokens),
                "Completion hit the token limit"
            );
        }

        let content = response.content().trim();
        if content.is_empty() {
            return Err(DomainError::provider(provider_name, "Empty completion"));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl TextCompletion for CompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, DomainError> {
        let llm_request = self.build_request(&request);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.attempt(&llm_request).await {
                Ok(text) => {
                    debug!(
                        model = %self.model,
                        attempts = attempt + 1,
                        latency_ms = start.elapsed().as_millis() as u64,
                        "Completion succeeded"
                    );
                    record_llm_request("success", start.elapsed());
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_after(&e, attempt);
                    warn!(
                        model = %self.model,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying model call"
                    );
                    record_llm_retry(e.kind());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(model = %self.model, attempts = attempt + 1, error = %e, "Model call failed");
                    record_llm_request(e.kind(), start.elapsed());
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::{LlmResponse, Message};

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .with_initial_delay(1)
            .with_max_delay(5)
    }

    #[derive(Debug)]
    struct SlowProvider;

    #[async_trait]
    impl LlmProvider for SlowProvider {
        async fn chat(&self, _model: &str, _request: LlmRequest) -> Result<LlmResponse, DomainError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(LlmResponse::new(
                "slow".to_string(),
                "m".to_string(),
                Message::assistant("late"),
            ))
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_returns_trimmed_content() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("  positive \n"));
        let client = CompletionClient::new(provider, "m");

        let text = client.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "positive");
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let provider = Arc::new(
            MockLlmProvider::new("mock")
                .then(Err(DomainError::network("mock", "reset")))
                .then(Err(DomainError::rate_limited("mock", Some(1))))
                .with_content("ok"),
        );
        let client = CompletionClient::new(provider.clone(), "m").with_retry(fast_retry(3));

        let text = client.complete(CompletionRequest::new("hi")).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provider = Arc::new(
            MockLlmProvider::new("mock").with_error(DomainError::network("mock", "down")),
        );
        let client = CompletionClient::new(provider.clone(), "m").with_retry(fast_retry(2));

        let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, DomainError::Network { .. }));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_final_errors_are_not_retried() {
        let provider = Arc::new(
            MockLlmProvider::new("mock").with_error(DomainError::provider("mock", "HTTP 400")),
        );
        let client = CompletionClient::new(provider.clone(), "m").with_retry(fast_retry(3));

        assert!(client.complete(CompletionRequest::new("hi")).await.is_err());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_completion_is_error() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("   "));
        let client = CompletionClient::new(provider, "m");

        let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, DomainError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_timeout_applies_per_call() {
        let client = CompletionClient::new(Arc::new(SlowProvider), "m")
            .with_timeout(Duration::from_millis(20))
            .with_retry(RetryConfig::disabled());

        let err = client.complete(CompletionRequest::new("hi")).await.unwrap_err();
        assert_eq!(err, DomainError::timeout("slow", 20));
    }

    #[tokio::test]
    async fn test_requests_beyond_the_window_wait_instead_of_failing() {
        let provider = Arc::new(MockLlmProvider::new("mock").with_content("ok"));
        let limiter = Arc::new(RateLimiter::with_window(2, Duration::from_millis(300)));
        let client = CompletionClient::new(provider.clone(), "m")
            .with_rate_limiter(limiter)
            .with_retry(fast_retry(1));

        let started = Instant::now();
        let mut outcomes = Vec::new();
        for prompt in ["a", "b", "c"] {
            outcomes.push(client.complete(CompletionRequest::new(prompt)).await);
        }

        assert!(outcomes.iter().all(|o| o.as_deref() == Ok("ok")));
        assert_eq!(provider.call_count(), 3);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_build_request_maps_options() {
        let provider = Arc::new(MockLlmProvider::new("mock"));
        let client = CompletionClient::new(provider, "m");

        let request = client.build_request(
            &CompletionRequest::new("Rate this")
                .with_system("You are a grader")
                .with_temperature(0.3)
                .with_max_tokens(500)
                .json(),
        );

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(500));
        assert!(request.wants_json());
    }
}
