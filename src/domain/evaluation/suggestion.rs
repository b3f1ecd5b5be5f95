//! Improvement suggestions derived from report statistics

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use super::comparison::ComparisonReport;
use super::report::EvaluationReport;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "although", "because", "been", "before", "being",
    "below", "between", "both", "could", "does", "doing", "during", "each", "even", "every",
    "from", "further", "have", "having", "here", "into", "itself", "just", "lacks", "lacking",
    "less", "more", "most", "much", "need", "needs", "only", "other", "over", "quite", "rather",
    "response", "same", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "very", "were",
    "what", "when", "where", "which", "while", "with", "within", "without", "would", "your",
];

const MIN_THEME_WORD_LEN: usize = 4;

/// Thresholds driving the suggestion rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionThresholds {
    pub low_score_threshold: f64,
    pub high_variance_threshold: f64,
    pub format_pass_rate_threshold: f64,
    pub min_theme_occurrences: usize,
    pub max_themes: usize,
    pub technical_issue_threshold: f64,
    /// Validators whose failures indicate output-format problems
    pub format_graders: Vec<String>,
    /// Grader whose reasons and weaknesses feed theme extraction
    pub model_grader_name: String,
}

impl Default for SuggestionThresholds {
    fn default() -> Self {
        Self {
            low_score_threshold: 6.0,
            high_variance_threshold: 4.0,
            format_pass_rate_threshold: 0.7,
            min_theme_occurrences: 2,
            max_themes: 3,
            technical_issue_threshold: 0.3,
            format_graders: vec![
                "json_validator".to_string(),
                "regex_matcher".to_string(),
                "format_validator".to_string(),
                "structure_validator".to_string(),
            ],
            model_grader_name: "model_grader".to_string(),
        }
    }
}

/// Which rule produced a suggestion, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionRule {
    Winner,
    NoResults,
    LowScore,
    HighVariance,
    FormatCompliance,
    RecurringWeakness,
    TechnicalIssues,
    LooksGood,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub rule: SuggestionRule,
    pub message: String,
}

impl Suggestion {
    fn new(rule: SuggestionRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// What suggestions are derived from
#[derive(Debug, Clone, Copy)]
pub enum SuggestionSubject<'a> {
    Report(&'a EvaluationReport),
    Comparison(&'a ComparisonReport),
}

impl<'a> From<&'a EvaluationReport> for SuggestionSubject<'a> {
    fn from(report: &'a EvaluationReport) -> Self {
        Self::Report(report)
    }
}

impl<'a> From<&'a ComparisonReport> for SuggestionSubject<'a> {
    fn from(comparison: &'a ComparisonReport) -> Self {
        Self::Comparison(comparison)
    }
}

/// Run the rule table; output is deterministic for identical input
pub fn analyze(subject: SuggestionSubject<'_>, thresholds: &SuggestionThresholds) -> Vec<Suggestion> {
    match subject {
        SuggestionSubject::Report(report) => analyze_report(report, thresholds),
        SuggestionSubject::Comparison(comparison) => {
            let winner = comparison.winner();
            let mut suggestions = vec![Suggestion::new(
                SuggestionRule::Winner,
                format!(
                    "Variant '{}' performed best (average {:.1}/10, pass rate {:.0}%). Build on it.",
                    winner.name,
                    winner.avg_score,
                    winner.pass_rate * 100.0
                ),
            )];

            if let Some(report) = comparison.winner_report() {
                suggestions.extend(analyze_report(report, thresholds));
            }
            suggestions
        }
    }
}

/// Suggestion messages only
pub fn suggest_improvements(
    subject: SuggestionSubject<'_>,
    thresholds: &SuggestionThresholds,
) -> Vec<String> {
    analyze(subject, thresholds)
        .into_iter()
        .map(|s| s.message)
        .collect()
}

fn analyze_report(report: &EvaluationReport, thresholds: &SuggestionThresholds) -> Vec<Suggestion> {
    let stats = report.aggregate_stats();

    if stats.case_count == 0 {
        return vec![Suggestion::new(
            SuggestionRule::NoResults,
            "No test cases completed. Run the evaluation again before drawing conclusions.",
        )];
    }

    let mut suggestions = Vec::new();

    if stats.avg_score < thresholds.low_score_threshold {
        suggestions.push(Suggestion::new(
            SuggestionRule::LowScore,
            format!(
                "Average score is {:.1}/10. Add few-shot examples to the prompt that show the expected output for typical inputs.",
                stats.avg_score
            ),
        ));
    }

    if stats.score_variance > thresholds.high_variance_threshold {
        suggestions.push(Suggestion::new(
            SuggestionRule::HighVariance,
            format!(
                "Scores vary widely (variance {:.1}). Lower the temperature or add explicit constraints so outputs are more consistent.",
                stats.score_variance
            ),
        ));
    }

    let failing_format: Vec<String> = thresholds
        .format_graders
        .iter()
        .filter_map(|name| {
            stats
                .grader_pass_rate(name)
                .filter(|rate| *rate < thresholds.format_pass_rate_threshold)
                .map(|rate| format!("{} ({:.0}% pass)", name, rate * 100.0))
        })
        .collect();
    if !failing_format.is_empty() {
        suggestions.push(Suggestion::new(
            SuggestionRule::FormatCompliance,
            format!(
                "Output format checks fail too often: {}. State the required format explicitly and add structured output markers.",
                failing_format.join(", ")
            ),
        ));
    }

    let themes = recurring_themes(report, thresholds);
    if !themes.is_empty() {
        let listed: Vec<String> = themes
            .iter()
            .map(|(word, count)| format!("{} ({} cases)", word, count))
            .collect();
        suggestions.push(Suggestion::new(
            SuggestionRule::RecurringWeakness,
            format!(
                "Graders repeatedly flagged: {}. Address these weaknesses directly in the prompt instructions.",
                listed.join(", ")
            ),
        ));
    }

    let execution_rate = stats.failed_executions as f64 / stats.case_count as f64;
    let fallback_rate = if stats.total_verdicts == 0 {
        0.0
    } else {
        stats.fallback_verdicts as f64 / stats.total_verdicts as f64
    };
    if execution_rate > thresholds.technical_issue_threshold
        || fallback_rate > thresholds.technical_issue_threshold
    {
        suggestions.push(Suggestion::new(
            SuggestionRule::TechnicalIssues,
            format!(
                "{} of {} cases failed to execute and {} of {} verdicts fell back to a neutral score. Check model connectivity and rate limits before trusting these results.",
                stats.failed_executions,
                stats.case_count,
                stats.fallback_verdicts,
                stats.total_verdicts
            ),
        ));
    }

    if suggestions.is_empty() {
        suggestions.push(Suggestion::new(
            SuggestionRule::LooksGood,
            format!(
                "The prompt performs well (average {:.1}/10, pass rate {:.0}%). Consider adding harder edge cases to the test set.",
                stats.avg_score,
                stats.pass_rate * 100.0
            ),
        ));
    }

    suggestions
}

/// Words from model-grader feedback shared by at least
/// `min_theme_occurrences` distinct failing cases, most frequent first
fn recurring_themes(
    report: &EvaluationReport,
    thresholds: &SuggestionThresholds,
) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for result in report
        .case_results()
        .iter()
        .filter(|r| !r.case_passed() && !r.is_error())
    {
        let Some(verdict) = result
            .verdict(&thresholds.model_grader_name)
            .filter(|v| !v.is_fallback)
        else {
            continue;
        };

        let mut text = verdict.reason.clone();
        for weakness in verdict.detail_list("weaknesses") {
            text.push(' ');
            text.push_str(weakness);
        }

        let words: HashSet<String> = text
            .unicode_words()
            .map(str::to_lowercase)
            .filter(|w| w.chars().count() >= MIN_THEME_WORD_LEN)
            .filter(|w| w.chars().all(char::is_alphabetic))
            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
            .collect();

        for word in words {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut themes: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= thresholds.min_theme_occurrences)
        .collect();
    // BTreeMap iteration already orders ties alphabetically
    themes.sort_by(|a, b| b.1.cmp(&a.1));
    themes.truncate(thresholds.max_themes);
    themes
}
