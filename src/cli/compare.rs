//! Compare command - ranks prompt variants on one generated case set

use std::path::PathBuf;

use clap::Args;

use super::evaluate::load_cases;
use super::output::{
    print_comparison, print_evaluation, print_json, print_saved, print_suggestions,
};
use super::{Engine, cancel_on_ctrl_c};
use crate::config::AppConfig;
use crate::infrastructure::services::{
    ComparisonOptions, ComparisonRun, PartialComparison, PromptVariant,
};

#[derive(Args, Clone)]
pub struct CompareArgs {
    /// Variant as NAME=PROMPT; at least two
    #[arg(long = "variant", value_parser = parse_variant, required = true)]
    pub variants: Vec<PromptVariant>,

    #[arg(long)]
    pub use_case: String,

    /// Number of shared cases (defaults to evaluation.default_case_count)
    #[arg(long)]
    pub count: Option<usize>,

    /// JSON array of test cases to use instead of generating them
    #[arg(long)]
    pub cases: Option<PathBuf>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Validator to run, in order; repeatable
    #[arg(long = "validator")]
    pub validators: Vec<String>,

    #[arg(long)]
    pub no_model_grading: bool,

    /// Write the comparison to the results directory
    #[arg(long)]
    pub save: bool,
}

pub async fn run(args: CompareArgs, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let engine = Engine::from_config(config, &config.graders)?;
    let mut options = ComparisonOptions::new(args.use_case.clone());

    let test_cases = match args.cases.as_deref() {
        Some(path) => load_cases(path).await?,
        None => {
            let count = args
                .count
                .unwrap_or(config.evaluation.default_case_count);
            let generated = engine
                .generator
                .generate_comparison_cases(&args.use_case, count)
                .await?;
            options = options.with_generation(generated.degraded, generated.reason);
            generated.cases
        }
    };

    if !args.validators.is_empty() {
        options = options.with_validators(args.validators);
    }
    if args.no_model_grading {
        options = options.with_model_grading(false);
    }
    if let Some(temperature) = args.temperature {
        options = options.with_temperature(temperature);
    }

    let cancel = cancel_on_ctrl_c();
    let run = engine
        .service
        .compare_prompts(args.variants, test_cases, options, &cancel)
        .await?;
    let comparison = match run {
        ComparisonRun::Complete(comparison) => comparison,
        ComparisonRun::Cancelled(partial) => {
            return report_partial(&engine, partial, args.save, json).await;
        }
    };
    let suggestions = engine.service.suggest_improvements((&comparison).into());

    if json {
        print_json(&comparison)?;
    } else {
        print_comparison(&comparison);
        print_suggestions(&suggestions);
    }

    if args.save {
        let location = engine.service.save_report(comparison).await?;
        print_saved(&location);
    }

    Ok(())
}

/// Show and optionally save what finished before the comparison was interrupted
async fn report_partial(
    engine: &Engine,
    partial: PartialComparison,
    save: bool,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        print_json(&partial)?;
    } else {
        eprintln!(
            "Comparison cancelled: {} of {} variants finished, not ranked",
            partial.completed.len(),
            partial.variant_count()
        );
        for (name, report) in partial.reports() {
            println!("Variant {}", name);
            print_evaluation(report);
        }
    }

    if save {
        for (_, report) in partial.reports() {
            let location = engine.service.save_report(report.clone()).await?;
            print_saved(&location);
        }
    }

    Ok(())
}

fn parse_variant(value: &str) -> Result<PromptVariant, String> {
    let (name, prompt) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PROMPT, got '{}'", value))?;

    let name = name.trim();
    if name.is_empty() {
        return Err("variant name must not be empty".to_string());
    }

    Ok(PromptVariant::new(name, prompt))
}
