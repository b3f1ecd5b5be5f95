//! JSON file report repository
//!
//! Reports are written as pretty-printed documents named
//! `eval_report_<timestamp>_<id>.json` or `comparison_report_<timestamp>_<id>.json`
//! under a results directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::domain::error::DomainError;
use crate::domain::evaluation::{ReportLocation, ReportRepository, StoredReport};

const EVALUATION_PREFIX: &str = "eval_report_";
const COMPARISON_PREFIX: &str = "comparison_report_";
const ID_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct FileReportRepository {
    root: PathBuf,
}

impl FileReportRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(report: &StoredReport) -> String {
        let prefix = match report {
            StoredReport::Evaluation(_) => EVALUATION_PREFIX,
            StoredReport::Comparison(_) => COMPARISON_PREFIX,
        };
        let short_id: String = report.id().chars().take(ID_PREFIX_LEN).collect();

        format!(
            "{}{}_{}.json",
            prefix,
            report.created_at().format("%Y%m%d_%H%M%S"),
            short_id
        )
    }

    /// Bare file names resolve inside the root; anything with a directory
    /// component is used as given
    fn resolve(&self, location: &ReportLocation) -> PathBuf {
        let path = Path::new(location.as_str());
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => path.to_path_buf(),
            _ => self.root.join(path),
        }
    }

    fn is_report_file(name: &str) -> bool {
        name.ends_with(".json")
            && (name.starts_with(EVALUATION_PREFIX) || name.starts_with(COMPARISON_PREFIX))
    }

    /// Sort key: the timestamp segment, then the full name
    fn chronological_key(name: &str) -> (&str, &str) {
        let rest = name
            .strip_prefix(EVALUATION_PREFIX)
            .or_else(|| name.strip_prefix(COMPARISON_PREFIX))
            .unwrap_or(name);
        (rest, name)
    }
}

#[async_trait]
impl ReportRepository for FileReportRepository {
    async fn save(&self, report: &StoredReport) -> Result<ReportLocation, DomainError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create results directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let content = serde_json::to_string_pretty(report)
            .map_err(|e| DomainError::storage(format!("Failed to serialize report: {}", e)))?;

        let name = Self::file_name(report);
        let path = self.root.join(&name);
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, content)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to write temp file: {}", e)))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to rename temp file: {}", e)))?;

        debug!(path = %path.display(), kind = report.kind(), "Report written");
        Ok(ReportLocation::new(name))
    }

    async fn load(&self, location: &ReportLocation) -> Result<StoredReport, DomainError> {
        let path = self.resolve(location);

        let content = fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::not_found(format!("Report '{}' not found", location))
            } else {
                DomainError::storage(format!("Failed to read {}: {}", path.display(), e))
            }
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DomainError::storage(format!("Failed to parse report {}: {}", location, e))
        })
    }

    async fn list(&self) -> Result<Vec<ReportLocation>, DomainError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read results directory {}: {}",
                    self.root.display(),
                    e
                )));
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list reports: {}", e)))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if Self::is_report_file(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort_by(|a, b| Self::chronological_key(a).cmp(&Self::chronological_key(b)));
        Ok(names.into_iter().map(ReportLocation::new).collect())
    }
}
