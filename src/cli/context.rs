//! Wiring of the model client, graders, storage and services

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::{Grader, GraderRegistry, LlmProvider, ReportRepository, TextCompletion};
use crate::infrastructure::grader::{GraderSettings, LlmGrader, register_builtin_graders};
use crate::infrastructure::llm::{CompletionClient, HttpClient, OpenAiProvider, RateLimiter};
use crate::infrastructure::report::FileReportRepository;
use crate::infrastructure::services::{
    EvaluationService, EvaluationServiceDeps, TestCaseGenerator,
};

/// Generator and evaluation service sharing one rate-limited model client
pub struct Engine {
    pub generator: TestCaseGenerator,
    pub service: EvaluationService,
}

impl Engine {
    pub fn from_config(config: &AppConfig, graders: &GraderSettings) -> anyhow::Result<Self> {
        let api_key = config.llm.resolve_api_key().context(
            "No API key configured: set llm.api_key, GROQ_API_KEY or OPENAI_API_KEY",
        )?;

        let request_timeout = Duration::from_millis(config.llm.request_timeout_ms);
        let http = HttpClient::with_timeout(request_timeout)?.with_label("openai");
        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
            http,
            api_key,
            config.llm.base_url.clone(),
        ));

        let client = CompletionClient::new(provider, config.llm.model.clone())
            .with_timeout(request_timeout)
            .with_retry(config.llm.retry.clone())
            .with_rate_limiter(Arc::new(RateLimiter::per_minute(
                config.llm.requests_per_minute,
            )));
        let grader_client = client.for_model(config.llm.grader_model());

        let registry = GraderRegistry::new();
        register_builtin_graders(&registry, graders)?;
        debug!(graders = ?registry.names(), "Grader registry ready");

        let model_grader: Arc<dyn Grader> = Arc::new(LlmGrader::new(
            Arc::new(grader_client),
            graders.model.clone(),
            graders.threshold_for(LlmGrader::NAME),
        ));

        let client: Arc<dyn TextCompletion> = Arc::new(client);
        let generator = TestCaseGenerator::new(client.clone(), config.evaluation.clone());

        let deps = EvaluationServiceDeps {
            client,
            registry: Arc::new(registry),
            model_grader: Some(model_grader),
            repository: Some(repository(config)),
        };
        let service = EvaluationService::new(deps, config.evaluation.clone())
            .with_thresholds(config.suggestions.clone());

        Ok(Self { generator, service })
    }
}

/// Report storage rooted at `storage.results_dir`
pub fn repository(config: &AppConfig) -> Arc<dyn ReportRepository> {
    Arc::new(FileReportRepository::new(&config.storage.results_dir))
}
