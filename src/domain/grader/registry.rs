use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::{FnGrader, Grader, GraderVerdict, GradingContext};
use crate::domain::DomainError;

/// Name-keyed table of graders. Registration is last-write-wins.
#[derive(Debug, Default)]
pub struct GraderRegistry {
    graders: RwLock<BTreeMap<String, Arc<dyn Grader>>>,
}

impl GraderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a grader under its own name, replacing any previous entry
    pub fn register(&self, grader: Arc<dyn Grader>) -> Result<(), DomainError> {
        let name = grader.name().to_string();
        let mut graders = self
            .graders
            .write()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;

        if graders.insert(name.clone(), grader).is_some() {
            debug!(grader = %name, "Replaced existing grader registration");
        }
        Ok(())
    }

    /// Register a closure as a grader
    pub fn register_fn<F>(&self, name: impl Into<String>, func: F) -> Result<(), DomainError>
    where
        F: Fn(&str, &GradingContext<'_>) -> GraderVerdict + Send + Sync + 'static,
    {
        self.register(Arc::new(FnGrader::new(name, func)))
    }

    pub fn get(&self, name: &str) -> Result<Option<Arc<dyn Grader>>, DomainError> {
        let graders = self
            .graders
            .read()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;
        Ok(graders.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graders
            .read()
            .map(|g| g.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.graders
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up graders in the requested order; any unknown name is a
    /// configuration error
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Grader>>, DomainError> {
        let graders = self
            .graders
            .read()
            .map_err(|_| DomainError::internal("Lock poisoned"))?;

        names
            .iter()
            .map(|name| {
                graders.get(name).cloned().ok_or_else(|| {
                    DomainError::configuration(format!("Unknown validator: {}", name))
                })
            })
            .collect()
    }
}
