use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Backoff policy for retryable model-call failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries at all
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }

    /// Delay before retrying after `error`; a server hint wins over the
    /// backoff schedule but is still capped at `max_delay_ms`
    pub fn delay_after(&self, error: &DomainError, attempt: u32) -> Duration {
        match error.retry_after_ms() {
            Some(hint) => Duration::from_millis(hint.min(self.max_delay_ms)),
            None => self.delay_for_attempt(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_calculation() {
        let config = RetryConfig::default();

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let config = RetryConfig::default().with_max_delay(2000);

        let hinted = DomainError::rate_limited("groq", Some(800));
        assert_eq!(config.delay_after(&hinted, 0), Duration::from_millis(800));

        let too_long = DomainError::rate_limited("groq", Some(60_000));
        assert_eq!(config.delay_after(&too_long, 0), Duration::from_millis(2000));

        let no_hint = DomainError::network("groq", "reset");
        assert_eq!(config.delay_after(&no_hint, 1), Duration::from_millis(200));
    }
}
