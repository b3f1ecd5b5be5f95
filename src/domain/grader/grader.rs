use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use super::GraderVerdict;
use crate::domain::test_case::TestCase;

/// Everything a grader may look at besides the response text
#[derive(Debug, Clone, Copy)]
pub struct GradingContext<'a> {
    pub prompt: &'a str,
    pub test_case: &'a TestCase,
    pub use_case: &'a str,
}

impl<'a> GradingContext<'a> {
    pub fn new(prompt: &'a str, test_case: &'a TestCase, use_case: &'a str) -> Self {
        Self {
            prompt,
            test_case,
            use_case,
        }
    }
}

/// Uniform grading contract shared by code validators, the model grader and
/// user-registered graders. Graders never fail: problems are reported as a
/// low or fallback verdict.
#[async_trait]
pub trait Grader: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn evaluate(&self, response: &str, context: &GradingContext<'_>) -> GraderVerdict;
}

type GradeFn = dyn Fn(&str, &GradingContext<'_>) -> GraderVerdict + Send + Sync;

/// Adapts a plain closure into a [`Grader`]
#[derive(Clone)]
pub struct FnGrader {
    name: String,
    func: Arc<GradeFn>,
}

impl FnGrader {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str, &GradingContext<'_>) -> GraderVerdict + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl Debug for FnGrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGrader").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Grader for FnGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, response: &str, context: &GradingContext<'_>) -> GraderVerdict {
        (self.func)(response, context)
    }
}
