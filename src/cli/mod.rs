//! Command line front end
//!
//! Subcommands:
//! - `generate`: produce test cases for a use case
//! - `evaluate`: run one prompt against generated or supplied cases
//! - `compare`: rank several prompt variants on one shared case set
//! - `suggest`, `show`, `list`: work with saved reports

pub mod compare;
mod context;
pub mod evaluate;
pub mod generate;
mod output;
pub mod reports;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::observability::init_metrics;

pub use context::Engine;

/// Prompt evaluation - generate test cases, grade prompts and compare variants
#[derive(Parser)]
#[command(name = "prompt-eval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print full JSON documents instead of summaries
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate test cases for a use case
    Generate(generate::GenerateArgs),

    /// Evaluate one prompt
    Evaluate(evaluate::EvaluateArgs),

    /// Compare prompt variants on a shared test-case set
    Compare(compare::CompareArgs),

    /// Print improvement suggestions for a saved report
    Suggest(reports::ReportArgs),

    /// Print a saved report
    Show(reports::ReportArgs),

    /// List saved reports
    List,
}

/// Load configuration, install logging and metrics, then run one command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Invalid configuration")?;
    init_logging(&config.logging);
    let metrics = init_metrics(&config.metrics);

    let json = cli.json;
    let result = match cli.command {
        Command::Generate(args) => generate::run(args, &config, json).await,
        Command::Evaluate(args) => evaluate::run(args, &config, json).await,
        Command::Compare(args) => compare::run(args, &config, json).await,
        Command::Suggest(args) => reports::suggest(args, &config, json).await,
        Command::Show(args) => reports::show(args, &config, json).await,
        Command::List => reports::list(&config, json).await,
    };

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    result
}

/// Token cancelled on the first Ctrl-C; in-flight cases still finish
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping after in-flight cases");
            trigger.cancel();
        }
    });

    token
}
