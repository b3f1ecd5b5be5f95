//! Test case entity and related types

use serde::{Deserialize, Serialize};

use super::validation::{TestCaseValidationError, validate_test_case_id};

/// Test case identifier, unique within one test-case set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestCaseId(String);

impl TestCaseId {
    pub fn new(id: impl Into<String>) -> Result<Self, TestCaseValidationError> {
        let id = id.into();
        validate_test_case_id(&id)?;
        Ok(Self(id))
    }

    /// Sequential id used for generated sets (`case-1`, `case-2`, ...)
    pub fn sequential(position: usize) -> Self {
        Self(format!("case-{}", position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TestCaseId {
    type Error = TestCaseValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TestCaseId> for String {
    fn from(id: TestCaseId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Difficulty level the generator assigns to a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Lenient parse of model-provided labels; unknown labels yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// One synthetic input the prompt is evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    id: TestCaseId,
    input_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_behavior: Option<String>,
}

impl TestCase {
    pub fn new(id: TestCaseId, input_text: impl Into<String>) -> Self {
        Self {
            id,
            input_text: input_text.into(),
            category: None,
            difficulty: None,
            expected_behavior: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_expected_behavior(mut self, expected: impl Into<String>) -> Self {
        self.expected_behavior = Some(expected.into());
        self
    }

    pub fn id(&self) -> &TestCaseId {
        &self.id
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    pub fn expected_behavior(&self) -> Option<&str> {
        self.expected_behavior.as_deref()
    }
}

/// Output of the test-case generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCases {
    pub cases: Vec<TestCase>,
    /// True whenever any fallback case had to be used
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GeneratedCases {
    pub fn complete(cases: Vec<TestCase>) -> Self {
        Self {
            cases,
            degraded: false,
            reason: None,
        }
    }

    pub fn degraded(cases: Vec<TestCase>, reason: impl Into<String>) -> Self {
        Self {
            cases,
            degraded: true,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_case_builder() {
        let case = TestCase::new(TestCaseId::sequential(1), "Where is my order?")
            .with_category("basic")
            .with_difficulty(Difficulty::Easy)
            .with_expected_behavior("Asks for the order number");

        assert_eq!(case.id().as_str(), "case-1");
        assert_eq!(case.input_text(), "Where is my order?");
        assert_eq!(case.category(), Some("basic"));
        assert_eq!(case.difficulty(), Some(Difficulty::Easy));
        assert_eq!(case.expected_behavior(), Some("Asks for the order number"));
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(Difficulty::parse("Hard"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse(" medium "), Some(Difficulty::Medium));
        assert_eq!(Difficulty::parse("extreme"), None);
    }

    #[test]
    fn test_serialization_skips_empty_optionals() {
        let case = TestCase::new(TestCaseId::sequential(2), "hello");
        let json = serde_json::to_value(&case).unwrap();

        assert_eq!(json["id"], "case-2");
        assert_eq!(json["input_text"], "hello");
        assert!(json.get("category").is_none());
        assert!(json.get("difficulty").is_none());
    }

    #[test]
    fn test_invalid_id_rejected_on_deserialize() {
        let result: Result<TestCase, _> =
            serde_json::from_str(r#"{"id": "", "input_text": "hi"}"#);
        assert!(result.is_err());
    }
}
