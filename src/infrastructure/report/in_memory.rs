//! In-memory report repository

use async_trait::async_trait;
use std::sync::RwLock;

use crate::domain::error::DomainError;
use crate::domain::evaluation::{ReportLocation, ReportRepository, StoredReport};

/// Keeps reports in insertion order; saving an existing id replaces it
#[derive(Debug, Default)]
pub struct InMemoryReportRepository {
    reports: RwLock<Vec<(ReportLocation, StoredReport)>>,
}

impl InMemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn location_for(report: &StoredReport) -> ReportLocation {
        ReportLocation::new(format!("{}/{}", report.kind(), report.id()))
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn save(&self, report: &StoredReport) -> Result<ReportLocation, DomainError> {
        let location = Self::location_for(report);
        let mut guard = self
            .reports
            .write()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;

        match guard.iter_mut().find(|(existing, _)| *existing == location) {
            Some(entry) => entry.1 = report.clone(),
            None => guard.push((location.clone(), report.clone())),
        }

        Ok(location)
    }

    async fn load(&self, location: &ReportLocation) -> Result<StoredReport, DomainError> {
        let guard = self
            .reports
            .read()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;

        guard
            .iter()
            .find(|(existing, _)| existing == location)
            .map(|(_, report)| report.clone())
            .ok_or_else(|| DomainError::not_found(format!("Report '{}' not found", location)))
    }

    async fn list(&self) -> Result<Vec<ReportLocation>, DomainError> {
        let guard = self
            .reports
            .read()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;

        Ok(guard.iter().map(|(location, _)| location.clone()).collect())
    }
}
