//! Evaluation domain - reports, aggregation, comparison and suggestions

mod comparison;
mod report;
mod repository;
mod settings;
pub mod statistics;
mod suggestion;

pub use comparison::{
    CaseDelta, ComparisonReport, PairSignificance, PairwiseDelta, VariantRanking,
    compare_reports, select_winner,
};
pub use report::{
    AggregateStats, CaseResult, EvaluationParameters, EvaluationReport, GraderSummary,
};
pub use repository::{ReportLocation, ReportRepository, StoredReport};
pub use settings::{
    EvaluationConfigError, EvaluationSettings, validate_prompt, validate_temperature,
};
pub use suggestion::{
    Suggestion, SuggestionRule, SuggestionSubject, SuggestionThresholds, analyze,
    suggest_improvements,
};

#[cfg(test)]
pub use repository::MockReportRepository;
