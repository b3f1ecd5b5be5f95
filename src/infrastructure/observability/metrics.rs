//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Handle onto the installed Prometheus recorder
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Render the metrics in Prometheus text exposition format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::debug!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("prompt_eval_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Record one finished model call (after retries)
pub fn record_llm_request(status: &str, duration: Duration) {
    let labels = [("status", status.to_string())];

    counter!("llm_requests_total", &labels).increment(1);
    histogram!("llm_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record one retry of a model call
pub fn record_llm_retry(reason: &str) {
    counter!("llm_retries_total", "reason" => reason.to_string()).increment(1);
}

/// Outcome label for a finished test case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Failed,
    Error,
}

impl CaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

/// Record one executed and graded test case
pub fn record_case(outcome: CaseOutcome, duration: Duration) {
    counter!("eval_cases_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("eval_case_duration_seconds").record(duration.as_secs_f64());
}

/// Record a grader falling back to its neutral verdict
pub fn record_grader_fallback(grader: &str) {
    counter!("eval_grader_fallbacks_total", "grader" => grader.to_string()).increment(1);
}

/// Record a test-case generation request
pub fn record_generation(degraded: bool) {
    let status = if degraded { "degraded" } else { "complete" };
    counter!("eval_generations_total", "status" => status).increment(1);
}
