//! Built-in graders: deterministic validators and the model-based grader

mod model_grader;
mod sentiment;
mod settings;
mod validators;

use std::sync::Arc;

use tracing::debug;

pub use model_grader::LlmGrader;
pub use sentiment::{SentimentAnalyzer, classify as classify_sentiment, polarity};
pub use settings::{
    FormatKind, FormatSettings, GraderSettings, KeywordMode, KeywordSettings, LengthSettings,
    ModelGraderSettings, RegexSettings, Sentiment, SentimentSettings, StructureSettings,
    WordCountSettings,
};
pub use validators::{
    CodeValidator, FormatValidator, JsonValidator, KeywordChecker, LengthValidator, RegexMatcher,
    StructureValidator, WordCountValidator,
};

use crate::domain::DomainError;
use crate::domain::grader::GraderRegistry;

/// Register every built-in code validator the settings allow.
///
/// `regex_matcher` needs a pattern and `format_validator` needs a format
/// kind; both are skipped when unconfigured.
pub fn register_builtin_graders(
    registry: &GraderRegistry,
    settings: &GraderSettings,
) -> Result<(), DomainError> {
    registry.register(Arc::new(LengthValidator::new(
        &settings.length,
        settings.threshold_for(LengthValidator::NAME),
    )))?;
    registry.register(Arc::new(JsonValidator::new(
        settings.threshold_for(JsonValidator::NAME),
    )))?;
    registry.register(Arc::new(KeywordChecker::new(
        &settings.keywords,
        settings.threshold_for(KeywordChecker::NAME),
    )))?;
    registry.register(Arc::new(SentimentAnalyzer::new(
        settings.sentiment.expected,
        settings.threshold_for(SentimentAnalyzer::NAME),
    )))?;
    registry.register(Arc::new(WordCountValidator::new(
        &settings.word_count,
        settings.threshold_for(WordCountValidator::NAME),
    )))?;
    registry.register(Arc::new(StructureValidator::new(
        &settings.structure,
        settings.threshold_for(StructureValidator::NAME),
    )))?;

    if let Some(pattern) = settings.regex.pattern.as_deref() {
        registry.register(Arc::new(RegexMatcher::new(
            pattern,
            settings.regex.should_match,
            settings.threshold_for(RegexMatcher::NAME),
        )?))?;
    }

    if let Some(kind) = settings.format.kind {
        registry.register(Arc::new(FormatValidator::new(
            kind,
            settings.threshold_for(FormatValidator::NAME),
        )))?;
    }

    debug!(graders = ?registry.names(), "Registered built-in graders");
    Ok(())
}
