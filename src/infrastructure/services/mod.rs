//! Infrastructure services

mod evaluation_service;
mod generation_service;

pub use evaluation_service::{
    ComparisonOptions, ComparisonRun, EvaluationRequest, EvaluationService, EvaluationServiceDeps,
    PartialComparison, PromptVariant,
};
pub use generation_service::TestCaseGenerator;
