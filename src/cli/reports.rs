//! Saved report commands: suggest, show and list

use clap::Args;

use super::context::repository;
use super::output::{print_json, print_stored, print_suggestions};
use crate::config::AppConfig;
use crate::domain::evaluation::{SuggestionSubject, suggest_improvements};
use crate::domain::{ReportLocation, StoredReport};

#[derive(Args, Clone)]
pub struct ReportArgs {
    /// File name inside the results directory, or a path
    #[arg(long)]
    pub report: String,
}

pub async fn suggest(args: ReportArgs, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let report = load(&args, config).await?;
    let subject = match &report {
        StoredReport::Evaluation(report) => SuggestionSubject::from(report),
        StoredReport::Comparison(report) => SuggestionSubject::from(report),
    };
    let suggestions = suggest_improvements(subject, &config.suggestions);

    if json {
        print_json(&suggestions)
    } else {
        print_suggestions(&suggestions);
        Ok(())
    }
}

pub async fn show(args: ReportArgs, config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let report = load(&args, config).await?;

    if json {
        print_json(&report)
    } else {
        print_stored(&report);
        Ok(())
    }
}

pub async fn list(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let locations = repository(config).list().await?;

    if json {
        return print_json(&locations);
    }

    if locations.is_empty() {
        println!("No reports in {}", config.storage.results_dir);
    }
    for location in &locations {
        println!("{}", location);
    }
    Ok(())
}

async fn load(args: &ReportArgs, config: &AppConfig) -> anyhow::Result<StoredReport> {
    let location = ReportLocation::new(args.report.clone());
    Ok(repository(config).load(&location).await?)
}
