//! Generate command - prints a test-case set as JSON

use clap::Args;
use tracing::warn;

use super::Engine;
use super::output::print_json;
use crate::config::AppConfig;

#[derive(Args, Clone)]
pub struct GenerateArgs {
    /// What the prompt is meant to do
    #[arg(long)]
    pub use_case: String,

    /// Number of cases (defaults to evaluation.default_case_count)
    #[arg(long)]
    pub count: Option<usize>,

    /// Prompt the cases are generated for
    #[arg(long)]
    pub prompt: Option<String>,

    /// Extra guidance for case diversity, repeatable
    #[arg(long = "hint")]
    pub hints: Vec<String>,

    /// Generate representative cases for comparing variants
    #[arg(long)]
    pub comparison: bool,
}

pub async fn run(args: GenerateArgs, config: &AppConfig, _json: bool) -> anyhow::Result<()> {
    let engine = Engine::from_config(config, &config.graders)?;
    let count = args
        .count
        .unwrap_or(config.evaluation.default_case_count);

    let generated = if args.comparison {
        engine
            .generator
            .generate_comparison_cases(&args.use_case, count)
            .await?
    } else {
        let description = args.prompt.as_deref().unwrap_or(&args.use_case);
        engine
            .generator
            .generate_test_cases(description, &args.use_case, count, &args.hints)
            .await?
    };

    if generated.degraded {
        warn!(
            reason = generated.reason.as_deref().unwrap_or_default(),
            "Generated set contains fallback cases"
        );
    }

    print_json(&generated)
}
