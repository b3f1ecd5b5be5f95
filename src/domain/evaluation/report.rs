//! Per-case results and the evaluation report

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::statistics::{mean, population_variance};
use crate::domain::DomainError;
use crate::domain::grader::GraderVerdict;
use crate::domain::test_case::{TestCase, TestCaseId};

/// Result of executing and grading one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CaseResultDocument")]
pub struct CaseResult {
    test_case_id: TestCaseId,
    generated_response: String,
    verdicts: Vec<GraderVerdict>,
    case_score: f64,
    case_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    latency_ms: u64,
}

/// Stored shape of a case result; derived fields are recomputed on load
#[derive(Deserialize)]
struct CaseResultDocument {
    test_case_id: TestCaseId,
    #[serde(default)]
    generated_response: String,
    #[serde(default)]
    verdicts: Vec<GraderVerdict>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    latency_ms: u64,
}

impl From<CaseResultDocument> for CaseResult {
    fn from(doc: CaseResultDocument) -> Self {
        match doc.error {
            Some(error) => Self::execution_error(doc.test_case_id, error, doc.latency_ms),
            None => Self::graded(
                doc.test_case_id,
                doc.generated_response,
                doc.verdicts,
                doc.latency_ms,
            ),
        }
    }
}

impl CaseResult {
    /// Successful execution; score and pass flag derive from the verdicts
    pub fn graded(
        test_case_id: TestCaseId,
        generated_response: impl Into<String>,
        verdicts: Vec<GraderVerdict>,
        latency_ms: u64,
    ) -> Self {
        let mut result = Self {
            test_case_id,
            generated_response: generated_response.into(),
            verdicts: Vec::new(),
            case_score: 0.0,
            case_passed: true,
            error: None,
            latency_ms,
        };
        result.replace_verdicts(verdicts);
        result
    }

    /// Model call failed after retries: failed, zero score, no verdicts
    pub fn execution_error(
        test_case_id: TestCaseId,
        error: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            test_case_id,
            generated_response: String::new(),
            verdicts: Vec::new(),
            case_score: 0.0,
            case_passed: false,
            error: Some(error.into()),
            latency_ms,
        }
    }

    /// Swap the verdicts of a graded case and re-derive score and pass flag
    pub fn replace_verdicts(&mut self, verdicts: Vec<GraderVerdict>) {
        if self.error.is_some() {
            return;
        }

        let scores: Vec<f64> = verdicts.iter().map(|v| v.score).collect();
        self.case_score = mean(&scores);
        self.case_passed = verdicts.iter().all(|v| v.passed);
        self.verdicts = verdicts;
    }

    pub fn test_case_id(&self) -> &TestCaseId {
        &self.test_case_id
    }

    pub fn generated_response(&self) -> &str {
        &self.generated_response
    }

    pub fn verdicts(&self) -> &[GraderVerdict] {
        &self.verdicts
    }

    pub fn verdict(&self, grader_name: &str) -> Option<&GraderVerdict> {
        self.verdicts.iter().find(|v| v.grader_name == grader_name)
    }

    pub fn case_score(&self) -> f64 {
        self.case_score
    }

    pub fn case_passed(&self) -> bool {
        self.case_passed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn fallback_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_fallback).count()
    }
}

/// Per-grader summary over one report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraderSummary {
    pub verdicts: usize,
    pub passed: usize,
    pub fallbacks: usize,
    pub avg_score: f64,
    pub pass_rate: f64,
}

/// Statistics derived from case results; never stored independently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub avg_score: f64,
    pub pass_rate: f64,
    pub score_variance: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub case_count: usize,
    pub passed_count: usize,
    pub failed_executions: usize,
    pub fallback_verdicts: usize,
    pub total_verdicts: usize,
    pub per_grader: BTreeMap<String, GraderSummary>,
}

impl AggregateStats {
    pub fn from_results(results: &[CaseResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let scores: Vec<f64> = results.iter().map(CaseResult::case_score).collect();
        let passed_count = results.iter().filter(|r| r.case_passed()).count();

        let mut per_grader: BTreeMap<String, (GraderSummary, f64)> = BTreeMap::new();
        for verdict in results.iter().flat_map(|r| r.verdicts()) {
            let (summary, score_sum) = per_grader.entry(verdict.grader_name.clone()).or_default();
            summary.verdicts += 1;
            if verdict.passed {
                summary.passed += 1;
            }
            if verdict.is_fallback {
                summary.fallbacks += 1;
            }
            *score_sum += verdict.score;
        }

        let per_grader: BTreeMap<String, GraderSummary> = per_grader
            .into_iter()
            .map(|(name, (mut summary, score_sum))| {
                let n = summary.verdicts as f64;
                summary.avg_score = score_sum / n;
                summary.pass_rate = summary.passed as f64 / n;
                (name, summary)
            })
            .collect();

        Self {
            avg_score: mean(&scores),
            pass_rate: passed_count as f64 / results.len() as f64,
            score_variance: population_variance(&scores),
            min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            case_count: results.len(),
            passed_count,
            failed_executions: results.iter().filter(|r| r.is_error()).count(),
            fallback_verdicts: results.iter().map(CaseResult::fallback_count).sum(),
            total_verdicts: results.iter().map(|r| r.verdicts().len()).sum(),
            per_grader,
        }
    }

    pub fn grader_pass_rate(&self, grader_name: &str) -> Option<f64> {
        self.per_grader.get(grader_name).map(|s| s.pass_rate)
    }
}

/// Parameters a run was executed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationParameters {
    pub temperature: f32,
    pub case_count: usize,
    pub validators: Vec<String>,
    pub model_grading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Outcome of evaluating one prompt against one test-case set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "EvaluationReportDocument", from = "EvaluationReportDocument")]
pub struct EvaluationReport {
    id: String,
    prompt_text: String,
    use_case: String,
    parameters: EvaluationParameters,
    test_cases: Vec<TestCase>,
    case_results: Vec<CaseResult>,
    generation_degraded: bool,
    degradation_reason: Option<String>,
    cancelled: bool,
    created_at: DateTime<Utc>,
    duration_ms: u64,
}

/// Serialized form: the report plus its aggregate statistics
#[derive(Serialize, Deserialize)]
struct EvaluationReportDocument {
    id: String,
    prompt_text: String,
    use_case: String,
    parameters: EvaluationParameters,
    test_cases: Vec<TestCase>,
    case_results: Vec<CaseResult>,
    #[serde(default)]
    generation_degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    degradation_reason: Option<String>,
    #[serde(default)]
    cancelled: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default, skip_deserializing)]
    aggregate_stats: AggregateStats,
}

impl From<EvaluationReport> for EvaluationReportDocument {
    fn from(report: EvaluationReport) -> Self {
        let aggregate_stats = report.aggregate_stats();
        Self {
            id: report.id,
            prompt_text: report.prompt_text,
            use_case: report.use_case,
            parameters: report.parameters,
            test_cases: report.test_cases,
            case_results: report.case_results,
            generation_degraded: report.generation_degraded,
            degradation_reason: report.degradation_reason,
            cancelled: report.cancelled,
            created_at: report.created_at,
            duration_ms: report.duration_ms,
            aggregate_stats,
        }
    }
}

impl From<EvaluationReportDocument> for EvaluationReport {
    fn from(doc: EvaluationReportDocument) -> Self {
        Self {
            id: doc.id,
            prompt_text: doc.prompt_text,
            use_case: doc.use_case,
            parameters: doc.parameters,
            test_cases: doc.test_cases,
            case_results: doc.case_results,
            generation_degraded: doc.generation_degraded,
            degradation_reason: doc.degradation_reason,
            cancelled: doc.cancelled,
            created_at: doc.created_at,
            duration_ms: doc.duration_ms,
        }
    }
}

impl EvaluationReport {
    pub fn new(
        prompt_text: impl Into<String>,
        use_case: impl Into<String>,
        parameters: EvaluationParameters,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt_text: prompt_text.into(),
            use_case: use_case.into(),
            parameters,
            test_cases,
            case_results: Vec::new(),
            generation_degraded: false,
            degradation_reason: None,
            cancelled: false,
            created_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn with_results(mut self, case_results: Vec<CaseResult>) -> Self {
        self.case_results = case_results;
        self
    }

    pub fn with_generation_degraded(mut self, reason: Option<String>) -> Self {
        self.generation_degraded = true;
        self.degradation_reason = reason;
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    pub fn parameters(&self) -> &EvaluationParameters {
        &self.parameters
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    pub fn case_results(&self) -> &[CaseResult] {
        &self.case_results
    }

    pub fn case_result_mut(&mut self, index: usize) -> Option<&mut CaseResult> {
        self.case_results.get_mut(index)
    }

    pub fn generation_degraded(&self) -> bool {
        self.generation_degraded
    }

    pub fn degradation_reason(&self) -> Option<&str> {
        self.degradation_reason.as_deref()
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Recomputed from `case_results` on every call
    pub fn aggregate_stats(&self) -> AggregateStats {
        AggregateStats::from_results(&self.case_results)
    }

    pub fn case_scores(&self) -> Vec<f64> {
        self.case_results.iter().map(CaseResult::case_score).collect()
    }

    /// Ensure the report was run on exactly `expected` (ids, inputs and
    /// annotations, in order) and has one result per case
    pub fn ensure_aligned_with(&self, expected: &[TestCase]) -> Result<(), DomainError> {
        if let Some(position) = first_difference(&self.test_cases, expected) {
            return Err(DomainError::comparison_mismatch(format!(
                "Report {} was run on a different test-case set (first difference at position {})",
                self.id,
                position + 1
            )));
        }

        let result_ids: Vec<&TestCaseId> =
            self.case_results.iter().map(CaseResult::test_case_id).collect();
        let expected: Vec<&TestCaseId> = expected.iter().map(TestCase::id).collect();

        if result_ids != expected {
            return Err(DomainError::comparison_mismatch(format!(
                "Report {} has {} results for {} shared test cases",
                self.id,
                result_ids.len(),
                expected.len()
            )));
        }

        Ok(())
    }
}

/// Index of the first case that differs, or the shorter length when one set
/// is a prefix of the other
fn first_difference(actual: &[TestCase], expected: &[TestCase]) -> Option<usize> {
    actual
        .iter()
        .zip(expected)
        .position(|(a, e)| a != e)
        .or_else(|| (actual.len() != expected.len()).then(|| actual.len().min(expected.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(name: &str, score: f64, passed: bool) -> GraderVerdict {
        GraderVerdict::new(name, score, passed, "test")
    }

    fn id(n: usize) -> TestCaseId {
        TestCaseId::sequential(n)
    }

    fn parameters(count: usize) -> EvaluationParameters {
        EvaluationParameters {
            temperature: 0.3,
            case_count: count,
            validators: vec!["keyword_checker".to_string()],
            model_grading: false,
            max_tokens: None,
        }
    }

    fn report_with_scores(scores: &[f64]) -> EvaluationReport {
        let cases: Vec<TestCase> = (1..=scores.len())
            .map(|n| TestCase::new(id(n), format!("input {}", n)))
            .collect();
        let results = scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                CaseResult::graded(id(i + 1), "out", vec![verdict("g", *s, *s >= 7.0)], 5)
            })
            .collect();

        EvaluationReport::new("prompt", "demo", parameters(scores.len()), cases)
            .with_results(results)
    }

    #[test]
    fn test_case_score_is_mean_of_verdicts() {
        let result = CaseResult::graded(
            id(1),
            "response",
            vec![verdict("a", 10.0, true), verdict("b", 6.0, true)],
            12,
        );

        assert_eq!(result.case_score(), 8.0);
        assert!(result.case_passed());
    }

    #[test]
    fn test_any_failing_verdict_fails_case() {
        let result = CaseResult::graded(
            id(1),
            "response",
            vec![verdict("a", 10.0, true), verdict("b", 9.0, false)],
            12,
        );

        assert_eq!(result.case_score(), 9.5);
        assert!(!result.case_passed());
    }

    #[test]
    fn test_no_verdicts_passes_with_zero_score() {
        let result = CaseResult::graded(id(1), "response", vec![], 3);
        assert_eq!(result.case_score(), 0.0);
        assert!(result.case_passed());
    }

    #[test]
    fn test_execution_error_case() {
        let result = CaseResult::execution_error(id(2), "Request timed out", 30_000);

        assert!(result.is_error());
        assert!(!result.case_passed());
        assert_eq!(result.case_score(), 0.0);
        assert!(result.verdicts().is_empty());
        assert_eq!(result.error(), Some("Request timed out"));
    }

    #[test]
    fn test_aggregate_stats() {
        let report = report_with_scores(&[6.0, 7.0, 8.0, 9.0]);
        let stats = report.aggregate_stats();

        assert_eq!(stats.case_count, 4);
        assert!((stats.avg_score - 7.5).abs() < 1e-9);
        assert!((stats.pass_rate - 0.75).abs() < 1e-9);
        assert!((stats.score_variance - 1.25).abs() < 1e-9);
        assert_eq!(stats.min_score, 6.0);
        assert_eq!(stats.max_score, 9.0);
        assert_eq!(stats.per_grader["g"].verdicts, 4);
        assert_eq!(stats.grader_pass_rate("g"), Some(0.75));
    }

    #[test]
    fn test_empty_report_stats() {
        let report = EvaluationReport::new("p", "u", parameters(0), vec![]);
        let stats = report.aggregate_stats();

        assert_eq!(stats.case_count, 0);
        assert_eq!(stats.avg_score, 0.0);
        assert_eq!(stats.pass_rate, 0.0);
    }

    #[test]
    fn test_avg_score_tracks_mutation() {
        let mut report = report_with_scores(&[6.0, 8.0]);
        assert!((report.aggregate_stats().avg_score - 7.0).abs() < 1e-9);

        report
            .case_result_mut(0)
            .unwrap()
            .replace_verdicts(vec![verdict("g", 10.0, true)]);

        assert!((report.aggregate_stats().avg_score - 9.0).abs() < 1e-9);
        assert_eq!(report.aggregate_stats().pass_rate, 1.0);
    }

    #[test]
    fn test_serialization_emits_aggregate_stats() {
        let report = report_with_scores(&[6.0, 8.0]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["aggregate_stats"]["avg_score"], 7.0);
        assert_eq!(json["case_results"][0]["case_score"], 6.0);
        assert_eq!(json["case_results"][1]["case_passed"], true);
    }

    #[test]
    fn test_round_trip_recomputes_derived_fields() {
        let report = report_with_scores(&[6.0, 8.0]);
        let mut json = serde_json::to_value(&report).unwrap();

        // Stale derived values in a stored document are ignored on load
        json["aggregate_stats"]["avg_score"] = serde_json::json!(1.0);
        json["case_results"][0]["case_score"] = serde_json::json!(0.5);

        let loaded: EvaluationReport = serde_json::from_value(json).unwrap();
        assert_eq!(loaded, report);
        assert_eq!(loaded.aggregate_stats().avg_score, 7.0);
    }

    #[test]
    fn test_alignment_check() {
        let report = report_with_scores(&[6.0, 8.0]);

        let cases = report.test_cases().to_vec();

        assert!(report.ensure_aligned_with(&cases).is_ok());

        let reversed: Vec<TestCase> = cases.iter().rev().cloned().collect();
        assert!(matches!(
            report.ensure_aligned_with(&reversed),
            Err(DomainError::ComparisonMismatch { .. })
        ));
        assert!(report.ensure_aligned_with(&cases[..1]).is_err());
    }

    #[test]
    fn test_alignment_compares_inputs_not_just_ids() {
        let report = report_with_scores(&[6.0, 8.0]);
        let same_ids_other_inputs = vec![
            TestCase::new(id(1), "input 1"),
            TestCase::new(id(2), "a completely different question"),
        ];

        let err = report
            .ensure_aligned_with(&same_ids_other_inputs)
            .unwrap_err();
        assert!(matches!(err, DomainError::ComparisonMismatch { .. }));
        assert!(err.to_string().contains("position 2"));
    }
}
