//! Evaluate command - runs one prompt and prints the report

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args};

use super::output::{print_evaluation, print_json, print_saved, print_suggestions};
use super::{Engine, cancel_on_ctrl_c};
use crate::config::AppConfig;
use crate::domain::TestCase;
use crate::infrastructure::grader::KeywordMode;
use crate::infrastructure::services::EvaluationRequest;

#[derive(Args, Clone)]
#[command(group(ArgGroup::new("prompt_source").required(true).args(["prompt", "prompt_file"])))]
pub struct EvaluateArgs {
    /// Prompt template; `{input}` is replaced by each case's input
    #[arg(long)]
    pub prompt: Option<String>,

    /// Read the prompt template from a file
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    #[arg(long)]
    pub use_case: String,

    /// Number of generated cases (defaults to evaluation.default_case_count)
    #[arg(long)]
    pub count: Option<usize>,

    /// JSON array of test cases to use instead of generating them
    #[arg(long)]
    pub cases: Option<PathBuf>,

    /// Extra guidance for case generation, repeatable
    #[arg(long = "hint")]
    pub hints: Vec<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Validator to run, in order; repeatable
    #[arg(long = "validator")]
    pub validators: Vec<String>,

    /// Keyword for keyword_checker, repeatable; any one must appear
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    /// Require every keyword instead of any one
    #[arg(long, requires = "keywords")]
    pub all_keywords: bool,

    #[arg(long)]
    pub no_model_grading: bool,

    /// Write the report to the results directory
    #[arg(long)]
    pub save: bool,
}

pub async fn run(args: EvaluateArgs, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let prompt = load_prompt(args.prompt.as_deref(), args.prompt_file.as_deref()).await?;

    let mut graders = config.graders.clone();
    if !args.keywords.is_empty() {
        let mode = if args.all_keywords {
            KeywordMode::RequireAll
        } else {
            KeywordMode::RequireAny
        };
        graders = graders.with_keywords(args.keywords.clone(), mode);
    }

    let engine = Engine::from_config(config, &graders)?;

    let mut request = match args.cases.as_deref() {
        Some(path) => EvaluationRequest::new(prompt, args.use_case, load_cases(path).await?),
        None => {
            let count = args
                .count
                .unwrap_or(config.evaluation.default_case_count);
            let generated = engine
                .generator
                .generate_test_cases(&prompt, &args.use_case, count, &args.hints)
                .await?;
            EvaluationRequest::from_generated(prompt, args.use_case, generated)
        }
    };

    if !args.validators.is_empty() {
        request = request.with_validators(args.validators);
    }
    if args.no_model_grading {
        request = request.with_model_grading(false);
    }
    if let Some(temperature) = args.temperature {
        request = request.with_temperature(temperature);
    }

    let cancel = cancel_on_ctrl_c();
    let report = engine.service.run_evaluation(request, &cancel).await?;
    let suggestions = engine.service.suggest_improvements((&report).into());

    if json {
        print_json(&report)?;
    } else {
        print_evaluation(&report);
        print_suggestions(&suggestions);
    }

    if args.save {
        let location = engine.service.save_report(report).await?;
        print_saved(&location);
    }

    Ok(())
}

pub(super) async fn load_prompt(
    prompt: Option<&str>,
    prompt_file: Option<&Path>,
) -> anyhow::Result<String> {
    match (prompt, prompt_file) {
        (Some(prompt), _) => Ok(prompt.to_string()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt file {}", path.display())),
        (None, None) => anyhow::bail!("Either --prompt or --prompt-file is required"),
    }
}

pub(super) async fn load_cases(path: &Path) -> anyhow::Result<Vec<TestCase>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read test cases {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Invalid test case document {}", path.display()))
}
