//! Terminal rendering of reports

use serde::Serialize;

use crate::domain::{ComparisonReport, EvaluationReport, ReportLocation, StoredReport};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_stored(report: &StoredReport) {
    match report {
        StoredReport::Evaluation(report) => print_evaluation(report),
        StoredReport::Comparison(report) => print_comparison(report),
    }
}

pub fn print_evaluation(report: &EvaluationReport) {
    let stats = report.aggregate_stats();

    println!("Evaluation {} ({})", report.id(), report.use_case());
    println!(
        "  cases: {}  passed: {}  pass rate: {:.1}%  avg score: {:.2}",
        stats.case_count,
        stats.passed_count,
        stats.pass_rate * 100.0,
        stats.avg_score
    );
    println!(
        "  failed executions: {}  fallback verdicts: {}  duration: {} ms",
        stats.failed_executions,
        stats.fallback_verdicts,
        report.duration_ms()
    );

    if report.generation_degraded() {
        println!(
            "  generation degraded: {}",
            report.degradation_reason().unwrap_or("fallback cases used")
        );
    }
    if report.cancelled() {
        println!(
            "  cancelled: {} of {} cases completed",
            report.case_results().len(),
            report.parameters().case_count
        );
    }

    for result in report.case_results() {
        let status = if result.case_passed() { "PASS" } else { "FAIL" };
        let verdicts: Vec<String> = result
            .verdicts()
            .iter()
            .map(|v| {
                let marker = if v.is_fallback { "*" } else { "" };
                format!("{}={:.1}{}", v.grader_name, v.score, marker)
            })
            .collect();

        match result.error() {
            Some(error) => println!("  {}  {}  error: {}", result.test_case_id(), status, error),
            None => println!(
                "  {}  {}  {:.2}  {}",
                result.test_case_id(),
                status,
                result.case_score(),
                verdicts.join(" ")
            ),
        }
    }
}

pub fn print_comparison(report: &ComparisonReport) {
    println!(
        "Comparison {} ({}) on {} shared cases",
        report.id(),
        report.use_case(),
        report.shared_test_cases().len()
    );

    for (position, ranking) in report.rankings().iter().enumerate() {
        println!(
            "  {}. {}  avg score: {:.2}  pass rate: {:.1}%",
            position + 1,
            ranking.name,
            ranking.avg_score,
            ranking.pass_rate * 100.0
        );
    }
    println!("  winner: {}", report.winner().name);

    for pair in report.deltas() {
        println!(
            "  {} -> {}: net change {:+.2}, {} improved, {} regressed",
            pair.baseline,
            pair.candidate,
            pair.net_change,
            pair.improvements.len(),
            pair.regressions.len()
        );
    }
    for significance in report.significance() {
        println!(
            "  {} vs {}: p = {:.4}{}",
            significance.baseline,
            significance.candidate,
            significance.p_value,
            if significance.is_significant {
                " (significant)"
            } else {
                ""
            }
        );
    }
}

pub fn print_suggestions(suggestions: &[String]) {
    if suggestions.is_empty() {
        return;
    }
    println!("Suggestions:");
    for suggestion in suggestions {
        println!("  - {}", suggestion);
    }
}

pub fn print_saved(location: &ReportLocation) {
    eprintln!("Saved report: {}", location);
}
