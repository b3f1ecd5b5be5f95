//! Comparing N prompt variants evaluated on the same test-case set

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::report::EvaluationReport;
use super::statistics::{mean, welch_t_test};
use crate::domain::DomainError;
use crate::domain::test_case::{TestCase, TestCaseId};

const SCORE_EPSILON: f64 = 1e-9;
const MAX_HIGHLIGHTS: usize = 5;

/// Headline numbers for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRanking {
    pub name: String,
    pub avg_score: f64,
    pub pass_rate: f64,
}

impl VariantRanking {
    fn from_report(name: &str, report: &EvaluationReport) -> Self {
        let stats = report.aggregate_stats();
        Self {
            name: name.to_string(),
            avg_score: stats.avg_score,
            pass_rate: stats.pass_rate,
        }
    }

    /// Better ranking sorts first: higher average, then higher pass rate,
    /// then lexicographically smaller name
    fn rank_cmp(&self, other: &Self) -> Ordering {
        float_desc(self.avg_score, other.avg_score)
            .then_with(|| float_desc(self.pass_rate, other.pass_rate))
            .then_with(|| self.name.cmp(&other.name))
    }
}

fn float_desc(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= SCORE_EPSILON {
        Ordering::Equal
    } else {
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    }
}

/// Score difference on one shared case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDelta {
    pub test_case_id: TestCaseId,
    pub baseline_score: f64,
    pub candidate_score: f64,
    pub delta: f64,
}

/// Per-case `score(candidate) - score(baseline)` for one variant pair,
/// where `baseline < candidate` by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseDelta {
    pub baseline: String,
    pub candidate: String,
    pub case_deltas: Vec<CaseDelta>,
    pub net_change: f64,
    /// Largest positive deltas, biggest first
    pub improvements: Vec<CaseDelta>,
    /// Largest negative deltas, biggest drop first
    pub regressions: Vec<CaseDelta>,
}

impl PairwiseDelta {
    fn between(
        baseline: &str,
        baseline_report: &EvaluationReport,
        candidate: &str,
        candidate_report: &EvaluationReport,
    ) -> Self {
        let case_deltas: Vec<CaseDelta> = baseline_report
            .case_results()
            .iter()
            .zip(candidate_report.case_results())
            .map(|(b, c)| CaseDelta {
                test_case_id: b.test_case_id().clone(),
                baseline_score: b.case_score(),
                candidate_score: c.case_score(),
                delta: c.case_score() - b.case_score(),
            })
            .collect();

        let deltas: Vec<f64> = case_deltas.iter().map(|d| d.delta).collect();

        let mut improvements: Vec<CaseDelta> = case_deltas
            .iter()
            .filter(|d| d.delta > SCORE_EPSILON)
            .cloned()
            .collect();
        improvements.sort_by(|a, b| b.delta.partial_cmp(&a.delta).unwrap_or(Ordering::Equal));
        improvements.truncate(MAX_HIGHLIGHTS);

        let mut regressions: Vec<CaseDelta> = case_deltas
            .iter()
            .filter(|d| d.delta < -SCORE_EPSILON)
            .cloned()
            .collect();
        regressions.sort_by(|a, b| a.delta.partial_cmp(&b.delta).unwrap_or(Ordering::Equal));
        regressions.truncate(MAX_HIGHLIGHTS);

        Self {
            baseline: baseline.to_string(),
            candidate: candidate.to_string(),
            net_change: mean(&deltas),
            case_deltas,
            improvements,
            regressions,
        }
    }

    pub fn deltas(&self) -> Vec<f64> {
        self.case_deltas.iter().map(|d| d.delta).collect()
    }
}

/// Welch's t-test on per-case scores of one variant pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSignificance {
    pub baseline: String,
    pub candidate: String,
    pub p_value: f64,
    pub is_significant: bool,
    pub confidence_level: f64,
}

impl PairSignificance {
    pub fn new(
        baseline: impl Into<String>,
        candidate: impl Into<String>,
        p_value: f64,
        confidence_level: f64,
    ) -> Self {
        Self {
            baseline: baseline.into(),
            candidate: candidate.into(),
            p_value,
            is_significant: p_value < (1.0 - confidence_level),
            confidence_level,
        }
    }
}

/// Outcome of comparing prompt variants on a shared test-case set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    id: String,
    use_case: String,
    variant_reports: BTreeMap<String, EvaluationReport>,
    shared_test_cases: Vec<TestCase>,
    winner: VariantRanking,
    rankings: Vec<VariantRanking>,
    deltas: Vec<PairwiseDelta>,
    significance: Vec<PairSignificance>,
    created_at: DateTime<Utc>,
}

impl ComparisonReport {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    pub fn variant_reports(&self) -> &BTreeMap<String, EvaluationReport> {
        &self.variant_reports
    }

    pub fn variant(&self, name: &str) -> Option<&EvaluationReport> {
        self.variant_reports.get(name)
    }

    pub fn shared_test_cases(&self) -> &[TestCase] {
        &self.shared_test_cases
    }

    pub fn winner(&self) -> &VariantRanking {
        &self.winner
    }

    pub fn winner_report(&self) -> Option<&EvaluationReport> {
        self.variant_reports.get(&self.winner.name)
    }

    /// All variants, best first
    pub fn rankings(&self) -> &[VariantRanking] {
        &self.rankings
    }

    pub fn deltas(&self) -> &[PairwiseDelta] {
        &self.deltas
    }

    pub fn significance(&self) -> &[PairSignificance] {
        &self.significance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Per-case `score(to) - score(from)` for any two variants
    pub fn deltas_between(&self, from: &str, to: &str) -> Option<Vec<f64>> {
        self.deltas.iter().find_map(|pair| {
            if pair.baseline == from && pair.candidate == to {
                Some(pair.deltas())
            } else if pair.baseline == to && pair.candidate == from {
                Some(pair.deltas().into_iter().map(|d| -d).collect())
            } else {
                None
            }
        })
    }
}

/// Pick the best variant: highest average, then pass rate, then name
pub fn select_winner(reports: &BTreeMap<String, EvaluationReport>) -> Option<VariantRanking> {
    reports
        .iter()
        .map(|(name, report)| VariantRanking::from_report(name, report))
        .min_by(|a, b| a.rank_cmp(b))
}

/// Build a comparison from already-computed reports.
///
/// Every report must cover the same ordered test-case sequence; otherwise
/// the comparison fails with `ComparisonMismatch`.
pub fn compare_reports(
    reports: BTreeMap<String, EvaluationReport>,
    confidence_level: f64,
) -> Result<ComparisonReport, DomainError> {
    if reports.len() < 2 {
        return Err(DomainError::configuration(format!(
            "At least two prompt variants are required, got {}",
            reports.len()
        )));
    }

    let (first_name, first_report) = reports
        .iter()
        .next()
        .ok_or_else(|| DomainError::internal("Empty report set"))?;

    let shared_test_cases = first_report.test_cases().to_vec();

    for (name, report) in &reports {
        report.ensure_aligned_with(&shared_test_cases).map_err(|e| match e {
            DomainError::ComparisonMismatch { message } => DomainError::comparison_mismatch(
                format!("Variant '{}' vs '{}': {}", name, first_name, message),
            ),
            other => other,
        })?;
    }

    let mut rankings: Vec<VariantRanking> = reports
        .iter()
        .map(|(name, report)| VariantRanking::from_report(name, report))
        .collect();
    rankings.sort_by(|a, b| a.rank_cmp(b));

    let winner = rankings
        .first()
        .cloned()
        .ok_or_else(|| DomainError::internal("No variant rankings"))?;

    let names: Vec<&String> = reports.keys().collect();
    let mut deltas = Vec::new();
    let mut significance = Vec::new();

    for (i, baseline) in names.iter().enumerate() {
        for candidate in &names[i + 1..] {
            let baseline_report = &reports[*baseline];
            let candidate_report = &reports[*candidate];

            deltas.push(PairwiseDelta::between(
                baseline,
                baseline_report,
                candidate,
                candidate_report,
            ));

            if let Some(p_value) =
                welch_t_test(&baseline_report.case_scores(), &candidate_report.case_scores())
            {
                significance.push(PairSignificance::new(
                    baseline.as_str(),
                    candidate.as_str(),
                    p_value,
                    confidence_level,
                ));
            }
        }
    }

    Ok(ComparisonReport {
        id: Uuid::new_v4().to_string(),
        use_case: first_report.use_case().to_string(),
        variant_reports: reports,
        shared_test_cases,
        winner,
        rankings,
        deltas,
        significance,
        created_at: Utc::now(),
    })
}
