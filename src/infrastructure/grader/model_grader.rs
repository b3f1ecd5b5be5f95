//! Model-based grader
//!
//! Asks the model to rate a response 1-10 and parses its JSON reply. Replies
//! that cannot be parsed and failed grading calls both produce a neutral
//! fallback verdict flagged with `is_fallback`. A fallback is held to the
//! pass threshold unless `fallback_passes` is set.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::settings::ModelGraderSettings;
use crate::domain::grader::{Grader, GraderVerdict, GradingContext};
use crate::domain::llm::{CompletionRequest, TextCompletion};
use crate::infrastructure::llm::parsing::parse_lenient;
use crate::infrastructure::observability::record_grader_fallback;

const MIN_MODEL_SCORE: f64 = 1.0;
const MAX_MODEL_SCORE: f64 = 10.0;

const GRADER_SYSTEM_PROMPT: &str =
    "You are a strict evaluator of LLM outputs. Reply with a single JSON object only.";

/// Grader that delegates the judgement to a language model
#[derive(Debug)]
pub struct LlmGrader {
    client: Arc<dyn TextCompletion>,
    settings: ModelGraderSettings,
    threshold: f64,
}

impl LlmGrader {
    pub const NAME: &'static str = "model_grader";

    pub fn new(client: Arc<dyn TextCompletion>, settings: ModelGraderSettings, threshold: f64) -> Self {
        Self {
            client,
            settings,
            threshold,
        }
    }

    fn build_grading_prompt(&self, response: &str, context: &GradingContext<'_>) -> String {
        let expected = context
            .test_case
            .expected_behavior()
            .unwrap_or("General quality");

        let additional = self
            .settings
            .custom_criteria
            .as_deref()
            .map(|criteria| format!("ADDITIONAL CRITERIA: {}\n\n", criteria))
            .unwrap_or_default();

        format!(
            "Score this LLM response on a scale of 1-10.\n\n\
             USE CASE: {use_case}\n\n\
             PROMPT UNDER TEST:\n{prompt}\n\n\
             INPUT: {input}\n\n\
             EXPECTED CRITERIA: {expected}\n\n\
             {additional}\
             RESPONSE TO GRADE:\n{response}\n\n\
             Evaluate based on:\n\
             1. Accuracy - Does it address the input correctly?\n\
             2. Completeness - Does it meet the expected criteria?\n\
             3. Format compliance - Is it properly formatted?\n\
             4. Clarity - Is it clear and coherent?\n\n\
             Return ONLY a JSON object with this exact structure:\n\
             {{\n  \"score\": <number 1-10>,\n  \"reason\": \"<brief explanation of the score>\",\n  \
             \"strengths\": [\"strength 1\"],\n  \"weaknesses\": [\"weakness 1\"]\n}}",
            use_case = context.use_case,
            prompt = context.prompt,
            input = context.test_case.input_text(),
        )
    }

    fn fallback(&self, reason: String) -> GraderVerdict {
        record_grader_fallback(Self::NAME);
        let mut verdict =
            GraderVerdict::fallback(Self::NAME, self.settings.fallback_score, self.threshold, reason);
        if self.settings.fallback_passes {
            verdict.passed = true;
        }
        verdict
    }

    fn verdict_from_reply(&self, reply: &str) -> Result<GraderVerdict, String> {
        let value = parse_lenient(reply).ok_or_else(|| "reply is not JSON".to_string())?;

        let parsed: GradeReply = serde_json::from_value(value)
            .map_err(|e| format!("unexpected reply shape: {}", e))?;

        let score = parsed
            .score
            .as_ref()
            .and_then(numeric_score)
            .ok_or_else(|| "reply has no numeric score".to_string())?
            .clamp(MIN_MODEL_SCORE, MAX_MODEL_SCORE);

        let reason = parsed
            .reason
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "No specific reason provided".to_string());

        Ok(GraderVerdict::scored(Self::NAME, score, self.threshold, reason).with_details(json!({
            "strengths": parsed.strengths,
            "weaknesses": parsed.weaknesses,
        })))
    }
}

#[derive(Debug, Deserialize)]
struct GradeReply {
    score: Option<Value>,
    reason: Option<Value>,
    #[serde(default, deserialize_with = "string_list")]
    strengths: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    weaknesses: Vec<String>,
}

/// Keeps the string entries of a list; `null` or any other shape reads as empty
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    };
    Ok(items)
}

/// Accepts `8`, `8.5` and `"8"`
fn numeric_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    score.filter(|s| s.is_finite())
}

#[async_trait]
impl Grader for LlmGrader {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, response: &str, context: &GradingContext<'_>) -> GraderVerdict {
        let request = CompletionRequest::new(self.build_grading_prompt(response, context))
            .with_system(GRADER_SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens)
            .json();

        let reply = match self.client.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    test_case = %context.test_case.id(),
                    error = %e,
                    "Grading call failed, using fallback score"
                );
                return self.fallback(format!("Grading unavailable: {}", e));
            }
        };

        match self.verdict_from_reply(&reply) {
            Ok(verdict) => {
                debug!(
                    test_case = %context.test_case.id(),
                    score = verdict.score,
                    passed = verdict.passed,
                    "Model grader verdict"
                );
                verdict
            }
            Err(problem) => {
                warn!(
                    test_case = %context.test_case.id(),
                    problem = %problem,
                    "Unable to parse grading response, using fallback score"
                );
                self.fallback(format!("Unable to parse grading response: {}", problem))
            }
        }
    }
}
