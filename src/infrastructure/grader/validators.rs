//! Deterministic code-based validators

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::json;

use super::settings::{
    FormatKind, KeywordMode, KeywordSettings, LengthSettings, StructureSettings,
    WordCountSettings,
};
use crate::domain::DomainError;
use crate::domain::grader::{Grader, GraderVerdict, GradingContext, MAX_SCORE};
use crate::infrastructure::llm::parsing::strip_code_fence;

/// A pure validator that only looks at the response text
pub trait CodeValidator: Send + Sync + std::fmt::Debug {
    fn validator_name(&self) -> &str;

    fn check(&self, response: &str) -> GraderVerdict;
}

#[async_trait]
impl<T: CodeValidator> Grader for T {
    fn name(&self) -> &str {
        self.validator_name()
    }

    async fn evaluate(&self, response: &str, _context: &GradingContext<'_>) -> GraderVerdict {
        self.check(response)
    }
}

/// Verdict that passes only when the check succeeded and the score clears
/// the threshold
fn verdict(
    name: &str,
    score: f64,
    check_passed: bool,
    threshold: f64,
    reason: impl Into<String>,
) -> GraderVerdict {
    GraderVerdict::new(name, score, check_passed && score >= threshold, reason)
}

/// Fraction of matches scaled to 0..=10 and floored
fn ratio_score(found: usize, required: usize) -> f64 {
    if required == 0 {
        return MAX_SCORE;
    }
    (found as f64 / required as f64 * MAX_SCORE).floor()
}

#[derive(Debug, Clone)]
pub struct LengthValidator {
    min_chars: usize,
    max_chars: usize,
    threshold: f64,
}

impl LengthValidator {
    pub const NAME: &'static str = "length_validator";

    pub fn new(settings: &LengthSettings, threshold: f64) -> Self {
        Self {
            min_chars: settings.min_chars,
            max_chars: settings.max_chars,
            threshold,
        }
    }
}

impl CodeValidator for LengthValidator {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let length = response.chars().count();

        if length < self.min_chars {
            verdict(
                Self::NAME,
                3.0,
                false,
                self.threshold,
                format!(
                    "Response too short ({} chars, minimum {})",
                    length, self.min_chars
                ),
            )
        } else if length > self.max_chars {
            verdict(
                Self::NAME,
                5.0,
                false,
                self.threshold,
                format!(
                    "Response too long ({} chars, maximum {})",
                    length, self.max_chars
                ),
            )
        } else {
            verdict(
                Self::NAME,
                MAX_SCORE,
                true,
                self.threshold,
                format!("Length appropriate ({} chars)", length),
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonValidator {
    threshold: f64,
}

impl JsonValidator {
    pub const NAME: &'static str = "json_validator";

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl CodeValidator for JsonValidator {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        match serde_json::from_str::<serde_json::Value>(strip_code_fence(response)) {
            Ok(_) => verdict(Self::NAME, MAX_SCORE, true, self.threshold, "Valid JSON format"),
            Err(e) => verdict(
                Self::NAME,
                0.0,
                false,
                self.threshold,
                format!("Invalid JSON: {}", e),
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeywordChecker {
    keywords: Vec<String>,
    mode: KeywordMode,
    case_sensitive: bool,
    threshold: f64,
}

impl KeywordChecker {
    pub const NAME: &'static str = "keyword_checker";

    pub fn new(settings: &KeywordSettings, threshold: f64) -> Self {
        Self {
            keywords: settings.keywords.clone(),
            mode: settings.mode,
            case_sensitive: settings.case_sensitive,
            threshold,
        }
    }
}

impl CodeValidator for KeywordChecker {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        if self.keywords.is_empty() {
            return verdict(
                Self::NAME,
                MAX_SCORE,
                true,
                self.threshold,
                "No keywords configured",
            );
        }

        let haystack = if self.case_sensitive {
            response.to_string()
        } else {
            response.to_lowercase()
        };

        let (found, missing): (Vec<&String>, Vec<&String>) =
            self.keywords.iter().partition(|keyword| {
                if self.case_sensitive {
                    haystack.contains(keyword.as_str())
                } else {
                    haystack.contains(&keyword.to_lowercase())
                }
            });

        let details = json!({ "found": found, "missing": missing });

        let (score, check_passed, reason) = match self.mode {
            KeywordMode::RequireAll => {
                let reason = if missing.is_empty() {
                    "All keywords present".to_string()
                } else {
                    format!(
                        "Found {}/{} keywords. Missing: {:?}",
                        found.len(),
                        self.keywords.len(),
                        missing
                    )
                };
                (
                    ratio_score(found.len(), self.keywords.len()),
                    missing.is_empty(),
                    reason,
                )
            }
            KeywordMode::RequireAny => {
                if found.is_empty() {
                    (
                        0.0,
                        false,
                        format!("None of the keywords present: {:?}", self.keywords),
                    )
                } else {
                    (MAX_SCORE, true, format!("Found keywords: {:?}", found))
                }
            }
        };

        verdict(Self::NAME, score, check_passed, self.threshold, reason).with_details(details)
    }
}

#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pattern: Regex,
    should_match: bool,
    threshold: f64,
}

impl RegexMatcher {
    pub const NAME: &'static str = "regex_matcher";

    /// Patterns match case-insensitively with `.` spanning newlines
    pub fn new(pattern: &str, should_match: bool, threshold: f64) -> Result<Self, DomainError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| DomainError::configuration(format!("Invalid regex pattern: {}", e)))?;

        Ok(Self {
            pattern,
            should_match,
            threshold,
        })
    }
}

impl CodeValidator for RegexMatcher {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let matched = self.pattern.is_match(response);
        let pattern = self.pattern.as_str();

        let (ok, reason) = match (self.should_match, matched) {
            (true, true) => (true, format!("Pattern matched: {}", pattern)),
            (true, false) => (false, format!("Pattern not found: {}", pattern)),
            (false, false) => (true, format!("Pattern correctly absent: {}", pattern)),
            (false, true) => (false, format!("Unwanted pattern found: {}", pattern)),
        };

        let score = if ok { MAX_SCORE } else { 0.0 };
        verdict(Self::NAME, score, ok, self.threshold, reason)
    }
}

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());
static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+\d{1,3}[-.]?)?\(?\d{3}\)?[-.]?\d{3}[-.]?\d{4}").unwrap()
});
static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}").unwrap());
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.?\d*$").unwrap());

#[derive(Debug, Clone)]
pub struct FormatValidator {
    kind: FormatKind,
    threshold: f64,
}

impl FormatValidator {
    pub const NAME: &'static str = "format_validator";

    pub fn new(kind: FormatKind, threshold: f64) -> Self {
        Self { kind, threshold }
    }

    fn pattern(&self) -> &'static Regex {
        match self.kind {
            FormatKind::Email => &EMAIL_PATTERN,
            FormatKind::Url => &URL_PATTERN,
            FormatKind::Phone => &PHONE_PATTERN,
            FormatKind::Date => &DATE_PATTERN,
            FormatKind::Number => &NUMBER_PATTERN,
        }
    }
}

impl CodeValidator for FormatValidator {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let kind = self.kind.as_str();

        if self.pattern().is_match(response.trim()) {
            verdict(
                Self::NAME,
                MAX_SCORE,
                true,
                self.threshold,
                format!("Valid {} format", kind),
            )
        } else {
            verdict(
                Self::NAME,
                0.0,
                false,
                self.threshold,
                format!("Invalid {} format", kind),
            )
        }
    }
}

#[derive(Debug, Clone)]
pub struct WordCountValidator {
    min_words: usize,
    max_words: usize,
    threshold: f64,
}

impl WordCountValidator {
    pub const NAME: &'static str = "word_count_validator";

    pub fn new(settings: &WordCountSettings, threshold: f64) -> Self {
        Self {
            min_words: settings.min_words,
            max_words: settings.max_words,
            threshold,
        }
    }
}

impl CodeValidator for WordCountValidator {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let words = response.split_whitespace().count();

        if (self.min_words..=self.max_words).contains(&words) {
            return verdict(
                Self::NAME,
                MAX_SCORE,
                true,
                self.threshold,
                format!("Word count in range ({} words)", words),
            );
        }

        // One point lost per ten words away from the middle of the range
        let midpoint = (self.min_words + self.max_words) / 2;
        let distance = words.abs_diff(midpoint) / 10;
        let score = MAX_SCORE - (distance as f64).min(MAX_SCORE);

        verdict(
            Self::NAME,
            score,
            false,
            self.threshold,
            format!(
                "Word count out of range ({} words, expected {}-{})",
                words, self.min_words, self.max_words
            ),
        )
    }
}

#[derive(Debug, Clone)]
pub struct StructureValidator {
    sections: Vec<String>,
    threshold: f64,
}

impl StructureValidator {
    pub const NAME: &'static str = "structure_validator";

    pub fn new(settings: &StructureSettings, threshold: f64) -> Self {
        Self {
            sections: settings.sections.clone(),
            threshold,
        }
    }
}

impl CodeValidator for StructureValidator {
    fn validator_name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, response: &str) -> GraderVerdict {
        let haystack = response.to_lowercase();
        let (found, missing): (Vec<&String>, Vec<&String>) = self
            .sections
            .iter()
            .partition(|section| haystack.contains(&section.to_lowercase()));

        verdict(
            Self::NAME,
            ratio_score(found.len(), self.sections.len()),
            missing.is_empty(),
            self.threshold,
            format!(
                "Found {}/{} required sections",
                found.len(),
                self.sections.len()
            ),
        )
        .with_details(json!({ "found": found, "missing": missing }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{TestCase, TestCaseId};

    const THRESHOLD: f64 = 7.0;

    fn keywords(words: &[&str], mode: KeywordMode) -> KeywordChecker {
        KeywordChecker::new(
            &KeywordSettings {
                keywords: words.iter().map(|w| w.to_string()).collect(),
                mode,
                case_sensitive: false,
            },
            THRESHOLD,
        )
    }

    #[test]
    fn test_length_validator() {
        let validator = LengthValidator::new(&LengthSettings::default(), THRESHOLD);

        let short = validator.check("tiny");
        assert_eq!(short.score, 3.0);
        assert!(!short.passed);

        let long = validator.check(&"x".repeat(5001));
        assert_eq!(long.score, 5.0);
        assert!(!long.passed);

        let ok = validator.check("A perfectly reasonable answer.");
        assert_eq!(ok.score, 10.0);
        assert!(ok.passed);
        assert_eq!(ok.grader_name, "length_validator");
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let validator = LengthValidator::new(
            &LengthSettings {
                min_chars: 3,
                max_chars: 4,
            },
            THRESHOLD,
        );
        assert!(validator.check("ñüé").passed);
    }

    #[test]
    fn test_json_validator() {
        let validator = JsonValidator::new(THRESHOLD);

        assert!(validator.check(r#"{"label": "positive"}"#).passed);
        assert!(validator.check("```json\n{\"label\": \"positive\"}\n```").passed);

        let invalid = validator.check("label: positive");
        assert_eq!(invalid.score, 0.0);
        assert!(invalid.reason.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_keyword_checker_require_all() {
        let checker = keywords(&["refund", "apology"], KeywordMode::RequireAll);

        let partial = checker.check("We will process your REFUND today.");
        assert_eq!(partial.score, 5.0);
        assert!(!partial.passed);
        assert_eq!(partial.detail_list("missing"), vec!["apology"]);

        let full = checker.check("Our apology, the refund is on its way.");
        assert_eq!(full.score, 10.0);
        assert!(full.passed);
    }

    #[test]
    fn test_keyword_checker_require_any() {
        let checker = keywords(&["positive", "negative", "neutral"], KeywordMode::RequireAny);

        let labelled = checker.check("Sentiment: Negative");
        assert_eq!(labelled.score, 10.0);
        assert!(labelled.passed);

        let unlabelled = checker.check("I am not sure");
        assert_eq!(unlabelled.score, 0.0);
        assert!(!unlabelled.passed);
    }

    #[test]
    fn test_keyword_checker_without_keywords() {
        let verdict = keywords(&[], KeywordMode::RequireAll).check("anything");
        assert_eq!(verdict.score, 10.0);
        assert!(verdict.passed);
    }

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(r"answer:.*yes", true, THRESHOLD).unwrap();
        assert!(matcher.check("ANSWER:\nyes").passed);
        assert!(!matcher.check("no idea").passed);

        let inverted = RegexMatcher::new(r"as an ai", false, THRESHOLD).unwrap();
        assert!(inverted.check("Here is the summary").passed);
        assert!(!inverted.check("As an AI, I cannot").passed);
    }

    #[test]
    fn test_regex_matcher_invalid_pattern() {
        let result = RegexMatcher::new("(unclosed", true, THRESHOLD);
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_format_validator() {
        let email = FormatValidator::new(FormatKind::Email, THRESHOLD);
        assert!(email.check("  jane.doe@example.com ").passed);
        assert!(!email.check("contact: jane.doe@example.com").passed);

        let date = FormatValidator::new(FormatKind::Date, THRESHOLD);
        assert!(date.check("Due on 2024-03-01").passed);
        assert!(date.check("03/01/2024").passed);

        let number = FormatValidator::new(FormatKind::Number, THRESHOLD);
        assert!(number.check("-12.5").passed);
        assert!(!number.check("twelve").passed);

        let url = FormatValidator::new(FormatKind::Url, THRESHOLD);
        assert_eq!(url.check("see https://example.com").score, 10.0);

        let phone = FormatValidator::new(FormatKind::Phone, THRESHOLD);
        assert!(phone.check("+1-555-123-4567").passed);
    }

    #[test]
    fn test_word_count_validator() {
        let validator = WordCountValidator::new(
            &WordCountSettings {
                min_words: 10,
                max_words: 100,
            },
            THRESHOLD,
        );

        assert!(validator.check(&"word ".repeat(20)).passed);

        // 3 words, midpoint 55, distance 52 -> 5 points lost
        let short = validator.check("only three words");
        assert_eq!(short.score, 5.0);
        assert!(!short.passed);

        // 150 words, distance 95 -> 9 points lost; still fails even at a
        // permissive threshold
        let lenient = WordCountValidator::new(
            &WordCountSettings {
                min_words: 10,
                max_words: 100,
            },
            0.0,
        );
        let long = lenient.check(&"word ".repeat(150));
        assert_eq!(long.score, 1.0);
        assert!(!long.passed);
    }

    #[test]
    fn test_structure_validator() {
        let validator = StructureValidator::new(
            &StructureSettings {
                sections: vec!["Summary".into(), "Steps".into(), "Risks".into()],
            },
            THRESHOLD,
        );

        let partial = validator.check("## summary\n...\n## Steps\n1. do it");
        assert_eq!(partial.score, 6.0);
        assert!(!partial.passed);
        assert_eq!(partial.detail_list("missing"), vec!["Risks"]);

        assert!(validator.check("Summary / Steps / Risks").passed);
    }

    #[tokio::test]
    async fn test_code_validator_is_a_grader() {
        let grader: Box<dyn Grader> = Box::new(JsonValidator::new(THRESHOLD));
        let case = TestCase::new(TestCaseId::sequential(1), "return json");
        let ctx = GradingContext::new("prompt", &case, "json api");

        assert_eq!(grader.name(), "json_validator");
        assert!(grader.evaluate("[1, 2, 3]", &ctx).await.passed);
    }
}
