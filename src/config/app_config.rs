use std::path::Path;

use serde::Deserialize;

use crate::domain::evaluation::{EvaluationSettings, SuggestionThresholds};
use crate::infrastructure::grader::GraderSettings;
use crate::infrastructure::llm::{DEFAULT_BASE_URL, RetryConfig};
use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub evaluation: EvaluationSettings,
    pub graders: GraderSettings,
    pub suggestions: SuggestionThresholds,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Model endpoint used for generation, execution and grading
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Falls back to `GROQ_API_KEY` / `OPENAI_API_KEY` when unset
    pub api_key: Option<String>,
    pub model: String,
    /// Model used by the model grader; defaults to `model`
    pub grader_model: Option<String>,
    pub request_timeout_ms: u64,
    pub requests_per_minute: u32,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub results_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: "llama-3.1-8b-instant".to_string(),
            grader_model: None,
            request_timeout_ms: 30_000,
            requests_per_minute: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".to_string(),
        }
    }
}

impl LlmConfig {
    /// Configured key, or the first provider key found in the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn grader_model(&self) -> &str {
        self.grader_model.as_deref().unwrap_or(&self.model)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layers `default` and `local` from `dir` (both optional), then `APP__*` env vars.
    /// Files that exist but do not parse, and values of the wrong type, are errors.
    pub fn load_from(dir: &Path) -> Result<Self, config::ConfigError> {
        let layer = |name: &str| {
            config::File::with_name(&dir.join(name).to_string_lossy()).required(false)
        };

        let config = config::Config::builder()
            .add_source(layer("default"))
            .add_source(layer("local"))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
