//! Domain layer - Core evaluation logic and entities

pub mod error;
pub mod evaluation;
pub mod grader;
pub mod llm;
pub mod prompt;
pub mod test_case;

pub use error::DomainError;
pub use evaluation::{
    AggregateStats, CaseResult, ComparisonReport, EvaluationParameters, EvaluationReport,
    EvaluationSettings, ReportLocation, ReportRepository, StoredReport, SuggestionSubject,
    SuggestionThresholds,
};
pub use grader::{FnGrader, Grader, GraderRegistry, GraderVerdict, GradingContext};
pub use llm::{
    CompletionRequest, FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder,
    LlmResponse, LlmResponseFormat, Message, MessageRole, TextCompletion, Usage,
};
pub use prompt::PromptTemplate;
pub use test_case::{Difficulty, GeneratedCases, TestCase, TestCaseId};
