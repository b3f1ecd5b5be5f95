use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::grader::DEFAULT_PASS_THRESHOLD;

/// Configuration for the built-in graders
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderSettings {
    /// Score at or above which a verdict passes
    pub pass_threshold: f64,
    /// Per-grader overrides of `pass_threshold`, keyed by grader name
    pub thresholds: BTreeMap<String, f64>,
    pub length: LengthSettings,
    pub keywords: KeywordSettings,
    pub regex: RegexSettings,
    pub sentiment: SentimentSettings,
    pub format: FormatSettings,
    pub word_count: WordCountSettings,
    pub structure: StructureSettings,
    pub model: ModelGraderSettings,
}

impl Default for GraderSettings {
    fn default() -> Self {
        Self {
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            thresholds: BTreeMap::new(),
            length: LengthSettings::default(),
            keywords: KeywordSettings::default(),
            regex: RegexSettings::default(),
            sentiment: SentimentSettings::default(),
            format: FormatSettings::default(),
            word_count: WordCountSettings::default(),
            structure: StructureSettings::default(),
            model: ModelGraderSettings::default(),
        }
    }
}

impl GraderSettings {
    pub fn threshold_for(&self, grader_name: &str) -> f64 {
        self.thresholds
            .get(grader_name)
            .copied()
            .unwrap_or(self.pass_threshold)
    }

    pub fn with_keywords(mut self, keywords: Vec<String>, mode: KeywordMode) -> Self {
        self.keywords.keywords = keywords;
        self.keywords.mode = mode;
        self
    }

    pub fn with_threshold(mut self, grader_name: impl Into<String>, threshold: f64) -> Self {
        self.thresholds.insert(grader_name.into(), threshold);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthSettings {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for LengthSettings {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    #[default]
    RequireAll,
    RequireAny,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSettings {
    pub keywords: Vec<String>,
    pub mode: KeywordMode,
    pub case_sensitive: bool,
}

/// `regex_matcher` is only registered when a pattern is configured
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegexSettings {
    pub pattern: Option<String>,
    pub should_match: bool,
}

impl Default for RegexSettings {
    fn default() -> Self {
        Self {
            pattern: None,
            should_match: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSettings {
    pub expected: Sentiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Email,
    Url,
    Phone,
    Date,
    Number,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::Phone => "phone",
            Self::Date => "date",
            Self::Number => "number",
        }
    }
}

/// `format_validator` is only registered when a format is configured
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub kind: Option<FormatKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordCountSettings {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for WordCountSettings {
    fn default() -> Self {
        Self {
            min_words: 10,
            max_words: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureSettings {
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelGraderSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Neutral score assigned when no real judgement could be obtained
    pub fallback_score: f64,
    /// Whether a fallback verdict counts as passing instead of being held to the threshold
    pub fallback_passes: bool,
    pub custom_criteria: Option<String>,
}

impl Default for ModelGraderSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
            fallback_score: 5.0,
            fallback_passes: false,
            custom_criteria: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_override() {
        let settings = GraderSettings::default().with_threshold("length_validator", 5.0);

        assert_eq!(settings.threshold_for("length_validator"), 5.0);
        assert_eq!(settings.threshold_for("json_validator"), 7.0);
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: GraderSettings = serde_json::from_str(
            r#"{"keywords": {"keywords": ["positive"], "mode": "require_any"}, "format": {"kind": "email"}}"#,
        )
        .unwrap();

        assert_eq!(settings.keywords.mode, KeywordMode::RequireAny);
        assert_eq!(settings.format.kind, Some(FormatKind::Email));
        assert_eq!(settings.length.max_chars, 5000);
        assert_eq!(settings.model.fallback_score, 5.0);
        assert!(!settings.model.fallback_passes);
    }
}
