//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    CaseOutcome, PrometheusMetrics, init_metrics, record_case, record_generation,
    record_grader_fallback, record_llm_request, record_llm_retry,
};
