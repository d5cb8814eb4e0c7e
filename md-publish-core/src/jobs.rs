//! Job Validator and dispatch table.
//!
//! Each supported job identifier maps to one [`JobHandler`]. Adding a job type
//! is a `register` call; nothing that calls [`JobRegistry::validate`] changes.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::contract::JobHandler;
use crate::error::PublishError;

/// The job used when a request omits `job`.
pub const DEFAULT_JOB: &str = "md2conf";

pub struct JobRegistry {
    default_job: String,
    handlers: BTreeMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    /// An empty registry whose default is `default_job`. The default must be
    /// registered before requests without `job` can be served.
    pub fn new(default_job: impl Into<String>) -> Self {
        Self {
            default_job: normalize(&default_job.into()),
            handlers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, job: &str, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(normalize(job), handler);
        self
    }

    /// Supported identifiers, sorted.
    pub fn supported(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Map an optional job identifier to its canonical form. Absent or empty
    /// values become the default; matching ignores case only.
    pub fn validate(&self, job: Option<&str>) -> Result<String, PublishError> {
        let canonical = match job.filter(|j| !j.is_empty()).map(normalize) {
            Some(job) => job,
            None => self.default_job.clone(),
        };
        if self.handlers.contains_key(&canonical) {
            Ok(canonical)
        } else {
            let supplied = job.unwrap_or_default().to_string();
            warn!(job = %supplied, supported = ?self.supported(), "Rejected unsupported job type");
            Err(PublishError::InvalidJobType {
                supplied,
                supported: self.supported(),
            })
        }
    }

    /// Validate and look up the handler in one step.
    pub fn handler_for(
        &self,
        job: Option<&str>,
    ) -> Result<(String, Arc<dyn JobHandler>), PublishError> {
        let canonical = self.validate(job)?;
        let handler = self.handlers.get(&canonical).cloned().ok_or_else(|| {
            PublishError::Internal(format!("no handler registered for '{canonical}'"))
        })?;
        Ok((canonical, handler))
    }
}

fn normalize(job: &str) -> String {
    job.to_lowercase()
}
