use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_SCORE: f64 = 10.0;
pub const DEFAULT_PASS_THRESHOLD: f64 = 7.0;

/// Outcome of one grader invocation on one (prompt, response) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraderVerdict {
    pub grader_name: String,
    pub score: f64,
    pub passed: bool,
    pub reason: String,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl GraderVerdict {
    /// Score is clamped into `0..=10`; non-finite scores become 0
    pub fn new(
        grader_name: impl Into<String>,
        score: f64,
        passed: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            grader_name: grader_name.into(),
            score: clamp_score(score),
            passed,
            reason: reason.into(),
            is_fallback: false,
            details: None,
        }
    }

    /// Verdict whose pass flag is `score >= threshold`
    pub fn scored(
        grader_name: impl Into<String>,
        score: f64,
        threshold: f64,
        reason: impl Into<String>,
    ) -> Self {
        let score = clamp_score(score);
        Self::new(grader_name, score, score >= threshold, reason)
    }

    /// Neutral verdict used when the grader could not produce a real judgement
    pub fn fallback(
        grader_name: impl Into<String>,
        score: f64,
        threshold: f64,
        reason: impl Into<String>,
    ) -> Self {
        let mut verdict = Self::scored(grader_name, score, threshold, reason);
        verdict.is_fallback = true;
        verdict
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// String list stored under `details[key]`, empty when absent
    pub fn detail_list(&self, key: &str) -> Vec<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, MAX_SCORE)
    } else {
        0.0
    }
}
