//! Engine settings and up-front validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Configuration problems detected before any model call is issued
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationConfigError {
    #[error("Case count {count} is outside the allowed range {min}-{max}")]
    CaseCountOutOfBounds { count: usize, min: usize, max: usize },

    #[error("Invalid case count bounds: min {min} > max {max}")]
    InvalidBounds { min: usize, max: usize },

    #[error("Temperature {0} is outside the allowed range 0.0-1.0")]
    TemperatureOutOfRange(f32),

    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Prompt text is required")]
    EmptyPrompt,

    #[error("At least two prompt variants are required, got {0}")]
    TooFewVariants(usize),

    #[error("Variant name is required")]
    EmptyVariantName,

    #[error("Duplicate variant name: {0}")]
    DuplicateVariant(String),

    #[error("Confidence level {0} must be strictly between 0 and 1")]
    InvalidConfidence(f64),
}

impl From<EvaluationConfigError> for DomainError {
    fn from(err: EvaluationConfigError) -> Self {
        DomainError::configuration(err.to_string())
    }
}

/// Settings consumed by the generator and the evaluation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub min_cases: usize,
    pub max_cases: usize,
    pub default_case_count: usize,
    /// Temperature for executing the prompt under evaluation
    pub temperature: f32,
    /// Maximum cases in flight at once
    pub concurrency: usize,
    pub max_response_tokens: u32,
    /// Validators enabled when a request does not name any
    pub validators: Vec<String>,
    pub model_grading: bool,
    pub generation_temperature: f32,
    pub comparison_generation_temperature: f32,
    pub generation_max_tokens: u32,
    /// Confidence level for pairwise significance tests
    pub confidence_level: f64,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            min_cases: 5,
            max_cases: 20,
            default_case_count: 10,
            temperature: 0.7,
            concurrency: 4,
            max_response_tokens: 1024,
            validators: Vec::new(),
            model_grading: true,
            generation_temperature: 0.8,
            comparison_generation_temperature: 0.7,
            generation_max_tokens: 2048,
            confidence_level: 0.95,
        }
    }
}

impl EvaluationSettings {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_case_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_cases = min;
        self.max_cases = max;
        self
    }

    /// Check the settings themselves
    pub fn validate(&self) -> Result<(), EvaluationConfigError> {
        if self.min_cases == 0 || self.min_cases > self.max_cases {
            return Err(EvaluationConfigError::InvalidBounds {
                min: self.min_cases,
                max: self.max_cases,
            });
        }

        if self.concurrency == 0 {
            return Err(EvaluationConfigError::ZeroConcurrency);
        }

        validate_temperature(self.temperature)?;
        validate_temperature(self.generation_temperature)?;
        validate_temperature(self.comparison_generation_temperature)?;
        self.validate_case_count(self.default_case_count)?;

        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(EvaluationConfigError::InvalidConfidence(
                self.confidence_level,
            ));
        }

        Ok(())
    }

    pub fn validate_case_count(&self, count: usize) -> Result<(), EvaluationConfigError> {
        if count < self.min_cases || count > self.max_cases {
            return Err(EvaluationConfigError::CaseCountOutOfBounds {
                count,
                min: self.min_cases,
                max: self.max_cases,
            });
        }
        Ok(())
    }
}

pub fn validate_temperature(temperature: f32) -> Result<(), EvaluationConfigError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(EvaluationConfigError::TemperatureOutOfRange(temperature));
    }
    Ok(())
}

pub fn validate_prompt(prompt: &str) -> Result<(), EvaluationConfigError> {
    if prompt.trim().is_empty() {
        return Err(EvaluationConfigError::EmptyPrompt);
    }
    Ok(())
}
