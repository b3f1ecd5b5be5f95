//! Test case validation

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::TestCase;
use crate::domain::DomainError;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

/// Validation errors for test cases
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TestCaseValidationError {
    #[error("Test case ID is required")]
    IdRequired,

    #[error("Test case ID is too long (max 100 characters)")]
    IdTooLong,

    #[error("Test case ID contains invalid characters: {0}")]
    InvalidId(String),

    #[error("Input text is required for test case {0}")]
    InputRequired(String),

    #[error("At least one test case is required")]
    EmptySet,

    #[error("Duplicate test case ID: {0}")]
    DuplicateId(String),
}

impl From<TestCaseValidationError> for DomainError {
    fn from(err: TestCaseValidationError) -> Self {
        DomainError::configuration(err.to_string())
    }
}

pub fn validate_test_case_id(id: &str) -> Result<(), TestCaseValidationError> {
    if id.is_empty() {
        return Err(TestCaseValidationError::IdRequired);
    }

    if id.len() > 100 {
        return Err(TestCaseValidationError::IdTooLong);
    }

    if !ID_PATTERN.is_match(id) {
        return Err(TestCaseValidationError::InvalidId(id.to_string()));
    }

    Ok(())
}

/// Validate a single test case
pub fn validate_test_case(test_case: &TestCase) -> Result<(), TestCaseValidationError> {
    if test_case.input_text().trim().is_empty() {
        return Err(TestCaseValidationError::InputRequired(
            test_case.id().to_string(),
        ));
    }

    Ok(())
}

/// Validate a full set: non-empty, every case valid, ids unique
pub fn validate_test_case_set(cases: &[TestCase]) -> Result<(), TestCaseValidationError> {
    if cases.is_empty() {
        return Err(TestCaseValidationError::EmptySet);
    }

    let mut seen = HashSet::new();
    for case in cases {
        validate_test_case(case)?;

        if !seen.insert(case.id().as_str()) {
            return Err(TestCaseValidationError::DuplicateId(case.id().to_string()));
        }
    }

    Ok(())
}
