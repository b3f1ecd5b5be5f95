//! Test case domain - synthetic inputs a prompt is evaluated against

mod entity;
mod validation;

pub use entity::{Difficulty, GeneratedCases, TestCase, TestCaseId};
pub use validation::{
    TestCaseValidationError, validate_test_case, validate_test_case_id, validate_test_case_set,
};
