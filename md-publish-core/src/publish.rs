//! Per-request orchestration: validate → locate → target → resolve → dispatch → cleanup.
//!
//! # Responsibilities
//! - Reject unsupported jobs, incoherent addressing, missing local files and
//!   missing Confluence fields before any download or subprocess.
//! - Hold the [`ResolvedSource`] for exactly the duration of the handler call,
//!   so a downloaded file is gone before the result is returned, whatever the
//!   outcome.
//! - Surface every failure as a [`PublishError`]; nothing is swallowed and
//!   nothing is retried.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::PublishConfig;
use crate::contract::{CommandRunner, GitHubApi, JobInput};
use crate::converter::Md2ConfJob;
use crate::error::PublishError;
use crate::jobs::{JobRegistry, DEFAULT_JOB};
use crate::request::{ConfluenceTarget, PublishRequest, PublishResult};
use crate::source::{self, SourceLocation, SourceResolver};

pub struct PublishService {
    config: Arc<PublishConfig>,
    jobs: JobRegistry,
    resolver: SourceResolver,
}

impl PublishService {
    /// Service with the standard job table (`md2conf`).
    pub fn new(
        config: PublishConfig,
        github: Arc<dyn GitHubApi>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let mut jobs = JobRegistry::new(DEFAULT_JOB);
        jobs.register(
            DEFAULT_JOB,
            Arc::new(Md2ConfJob::new(runner, config.converter.clone())),
        );
        Self::with_jobs(config, github, jobs)
    }

    /// Service with a caller-supplied job table.
    pub fn with_jobs(config: PublishConfig, github: Arc<dyn GitHubApi>, jobs: JobRegistry) -> Self {
        let config = Arc::new(config);
        let resolver = SourceResolver::new(github, Arc::clone(&config));
        Self {
            config,
            jobs,
            resolver,
        }
    }

    pub fn supported_jobs(&self) -> Vec<String> {
        self.jobs.supported()
    }

    /// Run one publish request and return the handler's success message.
    pub async fn publish(&self, request: &PublishRequest) -> Result<String, PublishError> {
        let (job, handler) = self.jobs.handler_for(request.job.as_deref())?;
        let location = source::locate(request, &self.config)?;

        // A missing local file is reported before the Confluence fields are
        // checked; a remote file is only downloaded once they are complete.
        let checked_local = match location {
            SourceLocation::Local(path) => Ok(self.resolver.check_local(path).await?),
            remote => Err(remote),
        };

        let target = ConfluenceTarget::from_request(request, &self.config.confluence)?;
        info!(
            job = %job,
            markdown_path = %request.markdown_path,
            dry_run = request.dry_run,
            "Publish request validated"
        );

        let resolved = match checked_local {
            Ok(resolved) => resolved,
            Err(remote) => {
                self.resolver
                    .materialize(remote, request.github_token.as_deref())
                    .await?
            }
        };

        let input = JobInput {
            source_path: resolved.path().to_path_buf(),
            display_name: request.markdown_path.trim().to_string(),
            target,
        };
        let outcome = handler.publish(&input).await;
        // Remove any download before the caller sees the outcome.
        drop(resolved);

        match &outcome {
            Ok(message) => info!(job = %job, message = %message, "Publish completed"),
            Err(e) => error!(job = %job, code = %e.code(), error = %e, "Publish failed"),
        }
        outcome
    }

    /// [`Self::publish`] folded into the response shape.
    pub async fn handle(&self, request: &PublishRequest) -> PublishResult {
        match self.publish(request).await {
            Ok(message) => PublishResult::succeeded(message),
            Err(e) => e.into_result(),
        }
    }
}
