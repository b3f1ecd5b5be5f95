//! Persistence contract for evaluation and comparison reports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use super::comparison::ComparisonReport;
use super::report::EvaluationReport;
use crate::domain::DomainError;

/// Document written to and read from report storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum StoredReport {
    Evaluation(EvaluationReport),
    Comparison(ComparisonReport),
}

impl StoredReport {
    pub fn id(&self) -> &str {
        match self {
            Self::Evaluation(report) => report.id(),
            Self::Comparison(report) => report.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Evaluation(_) => "evaluation",
            Self::Comparison(_) => "comparison",
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Evaluation(report) => report.created_at(),
            Self::Comparison(report) => report.created_at(),
        }
    }
}

impl From<EvaluationReport> for StoredReport {
    fn from(report: EvaluationReport) -> Self {
        Self::Evaluation(report)
    }
}

impl From<ComparisonReport> for StoredReport {
    fn from(report: ComparisonReport) -> Self {
        Self::Comparison(report)
    }
}

/// Opaque handle returned by `save` and accepted by `load`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportLocation(String);

impl ReportLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReportLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repository trait for report persistence
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn save(&self, report: &StoredReport) -> Result<ReportLocation, DomainError>;

    async fn load(&self, location: &ReportLocation) -> Result<StoredReport, DomainError>;

    /// Saved locations, oldest first
    async fn list(&self) -> Result<Vec<ReportLocation>, DomainError>;
}
