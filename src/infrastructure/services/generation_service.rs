//! Test case generation service - asks the model for synthetic inputs and
//! backfills with templated cases whenever the model falls short

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::evaluation::EvaluationSettings;
use crate::domain::llm::{CompletionRequest, TextCompletion};
use crate::domain::test_case::{Difficulty, GeneratedCases, TestCase, TestCaseId};
use crate::domain::DomainError;
use crate::infrastructure::llm::parsing::parse_lenient;
use crate::infrastructure::observability::record_generation;

const GENERATOR_SYSTEM_PROMPT: &str =
    "You are a test case generator for LLM prompt evaluation. Reply with JSON only.";

/// Deterministic cases used to pad a short or failed generation
const FALLBACK_TEMPLATES: &[(&str, Difficulty, &str)] = &[
    ("general", Difficulty::Easy, "A typical everyday request for {use_case}"),
    (
        "edge_case",
        Difficulty::Hard,
        "An ambiguous request that could reasonably be read two ways for {use_case}",
    ),
    (
        "general",
        Difficulty::Medium,
        "A detailed multi-part request with several constraints for {use_case}",
    ),
    (
        "edge_case",
        Difficulty::Hard,
        "A very short, terse request with almost no context for {use_case}",
    ),
    (
        "robustness",
        Difficulty::Medium,
        "A request containing typos and informal language for {use_case}",
    ),
];

/// Where a generated set came from
enum GenerationKind<'a> {
    Evaluation {
        prompt_description: &'a str,
        diversity_hints: &'a [String],
    },
    Comparison,
}

/// Generates synthetic test cases with the model
#[derive(Debug, Clone)]
pub struct TestCaseGenerator {
    client: Arc<dyn TextCompletion>,
    settings: EvaluationSettings,
}

impl TestCaseGenerator {
    pub fn new(client: Arc<dyn TextCompletion>, settings: EvaluationSettings) -> Self {
        Self { client, settings }
    }

    /// Generate `count` diverse cases for a prompt.
    ///
    /// Only fails when `count` is outside the configured bounds; model
    /// failures and malformed replies produce a degraded set instead.
    pub async fn generate_test_cases(
        &self,
        prompt_description: &str,
        use_case: &str,
        count: usize,
        diversity_hints: &[String],
    ) -> Result<GeneratedCases, DomainError> {
        self.settings.validate_case_count(count)?;

        let kind = GenerationKind::Evaluation {
            prompt_description,
            diversity_hints,
        };
        let request = CompletionRequest::new(build_generation_prompt(&kind, use_case, count))
            .with_system(GENERATOR_SYSTEM_PROMPT)
            .with_temperature(self.settings.generation_temperature)
            .with_max_tokens(self.settings.generation_max_tokens)
            .json();

        Ok(self.generate(request, use_case, count).await)
    }

    /// Generate `count` representative cases meant to be shared by several
    /// prompt variants
    pub async fn generate_comparison_cases(
        &self,
        use_case: &str,
        count: usize,
    ) -> Result<GeneratedCases, DomainError> {
        self.settings.validate_case_count(count)?;

        let request = CompletionRequest::new(build_generation_prompt(
            &GenerationKind::Comparison,
            use_case,
            count,
        ))
        .with_system(GENERATOR_SYSTEM_PROMPT)
        .with_temperature(self.settings.comparison_generation_temperature)
        .with_max_tokens(self.settings.generation_max_tokens)
        .json();

        Ok(self.generate(request, use_case, count).await)
    }

    async fn generate(
        &self,
        request: CompletionRequest,
        use_case: &str,
        count: usize,
    ) -> GeneratedCases {
        info!(use_case = %use_case, count, "Generating test cases");

        let (drafts, problem) = match self.client.complete(request).await {
            Ok(reply) => match parse_generated_cases(&reply) {
                Some(drafts) if drafts.len() >= count => (drafts, None),
                Some(drafts) => {
                    let problem = format!(
                        "Only {} of {} generated cases were usable",
                        drafts.len(),
                        count
                    );
                    (drafts, Some(problem))
                }
                None => (Vec::new(), Some("Unparsable generation reply".to_string())),
            },
            Err(e) => (Vec::new(), Some(format!("Model call failed: {}", e))),
        };

        let generated = finalize(drafts, use_case, count, problem);
        record_generation(generated.degraded);

        if generated.degraded {
            warn!(
                use_case = %use_case,
                reason = generated.reason.as_deref().unwrap_or_default(),
                "Test case generation degraded, padded with fallback cases"
            );
        } else {
            debug!(count = generated.cases.len(), "Test cases generated");
        }

        generated
    }
}

fn build_generation_prompt(kind: &GenerationKind<'_>, use_case: &str, count: usize) -> String {
    let format_block = "Return ONLY valid JSON in this exact format:\n\
         {\n  \"test_cases\": [\n    {\n      \"input\": \"test input here\",\n      \
         \"expected_criteria\": \"description of what good output looks like\",\n      \
         \"difficulty\": \"easy|medium|hard\",\n      \"category\": \"category name\"\n    }\n  ]\n}";

    match kind {
        GenerationKind::Evaluation {
            prompt_description,
            diversity_hints,
        } => {
            let hints = if diversity_hints.is_empty() {
                String::new()
            } else {
                let lines: Vec<String> =
                    diversity_hints.iter().map(|h| format!("- {}", h)).collect();
                format!("\nAlso cover:\n{}\n", lines.join("\n"))
            };

            format!(
                "Given this prompt template:\n{prompt_description}\n\n\
                 Use case: {use_case}\n\n\
                 Generate {count} diverse test cases that will thoroughly evaluate this prompt's performance.\n\n\
                 For each test case, provide:\n\
                 1. \"input\": The actual input text/query to test\n\
                 2. \"expected_criteria\": What makes a good response\n\
                 3. \"difficulty\": easy, medium, or hard\n\
                 4. \"category\": A category label for organizing results\n\n\
                 Make test cases diverse:\n\
                 - Include edge cases (empty input, very long input, ambiguous cases)\n\
                 - Cover different difficulty levels\n\
                 - Test various aspects of the prompt's requirements\n\
                 - Include both expected successes and challenging scenarios\n\
                 {hints}\n\
                 {format_block}"
            )
        }
        GenerationKind::Comparison => format!(
            "Generate {count} consistent test cases for comparing different prompt versions.\n\n\
             Use case: {use_case}\n\n\
             These test cases will be used to evaluate multiple prompt variants side-by-side.\n\
             Make them:\n\
             - Representative of real-world usage\n\
             - Challenging enough to differentiate prompt quality\n\
             - Consistent in difficulty distribution\n\n\
             {format_block}"
        ),
    }
}

/// A generated case before ids are assigned
#[derive(Debug, Clone, PartialEq)]
struct CaseDraft {
    input: String,
    expected: Option<String>,
    difficulty: Option<Difficulty>,
    category: Option<String>,
}

/// Parse the reply into drafts; `None` when no case list can be found
fn parse_generated_cases(reply: &str) -> Option<Vec<CaseDraft>> {
    let value = parse_lenient(reply)?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("test_cases") {
            Some(Value::Array(items)) => items,
            Some(_) => return None,
            None if map.contains_key("input") || map.contains_key("input_text") => {
                vec![Value::Object(map)]
            }
            None => return None,
        },
        _ => return None,
    };

    Some(items.iter().filter_map(parse_draft).collect())
}

fn parse_draft(item: &Value) -> Option<CaseDraft> {
    Some(CaseDraft {
        input: text_field(item, &["input", "input_text"])?,
        expected: text_field(item, &["expected_criteria", "expected_behavior"]),
        difficulty: text_field(item, &["difficulty"]).and_then(|d| Difficulty::parse(&d)),
        category: text_field(item, &["category"]),
    })
}

/// First non-blank string found under any of `keys`
fn text_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn fallback_draft(position: usize, use_case: &str) -> CaseDraft {
    let (category, difficulty, template) =
        FALLBACK_TEMPLATES[(position - 1) % FALLBACK_TEMPLATES.len()];

    CaseDraft {
        input: format!(
            "{} (test input {})",
            template.replace("{use_case}", use_case),
            position
        ),
        expected: Some("Should produce relevant and coherent output".to_string()),
        difficulty: Some(difficulty),
        category: Some(category.to_string()),
    }
}

/// Pad or truncate to exactly `count` cases and assign `case-N` ids
fn finalize(
    mut drafts: Vec<CaseDraft>,
    use_case: &str,
    count: usize,
    problem: Option<String>,
) -> GeneratedCases {
    drafts.truncate(count);
    for position in drafts.len() + 1..=count {
        drafts.push(fallback_draft(position, use_case));
    }

    let cases = drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let mut case = TestCase::new(TestCaseId::sequential(index + 1), draft.input);
            if let Some(expected) = draft.expected {
                case = case.with_expected_behavior(expected);
            }
            if let Some(difficulty) = draft.difficulty {
                case = case.with_difficulty(difficulty);
            }
            if let Some(category) = draft.category {
                case = case.with_category(category);
            }
            case
        })
        .collect();

    match problem {
        Some(reason) => GeneratedCases::degraded(cases, reason),
        None => GeneratedCases::complete(cases),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ScriptedCompletion;

    fn generator(client: ScriptedCompletion) -> TestCaseGenerator {
        TestCaseGenerator::new(Arc::new(client), EvaluationSettings::default())
    }

    fn cases_json(n: usize) -> String {
        let items: Vec<String> = (1..=n)
            .map(|i| {
                format!(
                    r#"{{"input": "I loved item {i}", "expected_criteria": "positive", "difficulty": "easy", "category": "basic"}}"#
                )
            })
            .collect();
        format!(r#"{{"test_cases": [{}]}}"#, items.join(","))
    }

    #[tokio::test]
    async fn test_generates_exact_count() {
        let client = ScriptedCompletion::always(cases_json(7));
        let generated = generator(client.clone())
            .generate_test_cases("Classify sentiment", "sentiment classifier", 5, &[])
            .await
            .unwrap();

        assert!(!generated.degraded);
        assert_eq!(generated.cases.len(), 5);
        assert_eq!(generated.cases[0].id().as_str(), "case-1");
        assert_eq!(generated.cases[4].id().as_str(), "case-5");
        assert_eq!(generated.cases[0].input_text(), "I loved item 1");
        assert_eq!(generated.cases[0].difficulty(), Some(Difficulty::Easy));
        assert_eq!(generated.cases[0].expected_behavior(), Some("positive"));

        let request = &client.requests()[0];
        assert!(request.json_mode);
        assert_eq!(request.temperature, 0.8);
        assert_eq!(request.max_tokens, Some(2048));
        assert!(request.prompt.contains("Generate 5 diverse test cases"));
    }

    #[tokio::test]
    async fn test_short_reply_is_padded_and_degraded() {
        let reply = r#"[{"input": "great!"}, {"input": "   "}, {"input_text": "meh", "difficulty": "extreme"}]"#;
        let generated = generator(ScriptedCompletion::always(reply))
            .generate_test_cases("p", "reviews", 5, &[])
            .await
            .unwrap();

        assert!(generated.degraded);
        assert_eq!(
            generated.reason.as_deref(),
            Some("Only 2 of 5 generated cases were usable")
        );
        assert_eq!(generated.cases.len(), 5);
        assert_eq!(generated.cases[1].input_text(), "meh");
        assert_eq!(generated.cases[1].difficulty(), None);
        assert!(generated.cases[2].input_text().contains("reviews"));
        assert_eq!(generated.cases[2].id().as_str(), "case-3");
    }

    #[tokio::test]
    async fn test_unparsable_reply_falls_back() {
        let generated = generator(ScriptedCompletion::always("Sorry, I can't do that."))
            .generate_test_cases("p", "email triage", 5, &[])
            .await
            .unwrap();

        assert!(generated.degraded);
        assert_eq!(generated.cases.len(), 5);
        assert!(generated.cases.iter().all(|c| c.input_text().contains("email triage")));
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let generated = generator(ScriptedCompletion::failing(DomainError::network(
            "groq",
            "connection refused",
        )))
        .generate_comparison_cases("summaries", 6)
        .await
        .unwrap();

        assert!(generated.degraded);
        assert!(generated.reason.unwrap().starts_with("Model call failed"));
        assert_eq!(generated.cases.len(), 6);
    }

    #[tokio::test]
    async fn test_count_outside_bounds_is_rejected() {
        let client = ScriptedCompletion::always(cases_json(30));
        let service = generator(client.clone());

        let too_few = service.generate_test_cases("p", "u", 4, &[]).await;
        let too_many = service.generate_comparison_cases("u", 21).await;

        assert!(matches!(too_few, Err(DomainError::Configuration { .. })));
        assert!(matches!(too_many, Err(DomainError::Configuration { .. })));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_comparison_uses_comparison_temperature() {
        let client = ScriptedCompletion::always(format!("```json\n{}\n```", cases_json(5)));
        let generated = generator(client.clone())
            .generate_comparison_cases("translation", 5)
            .await
            .unwrap();

        assert!(!generated.degraded);
        assert_eq!(client.requests()[0].temperature, 0.7);
        assert!(client.requests()[0].prompt.contains("comparing different prompt versions"));
    }

    #[tokio::test]
    async fn test_diversity_hints_reach_the_prompt() {
        let client = ScriptedCompletion::always(cases_json(5));
        generator(client.clone())
            .generate_test_cases("p", "u", 5, &["sarcasm".to_string()])
            .await
            .unwrap();

        assert!(client.requests()[0].prompt.contains("- sarcasm"));
    }
}
