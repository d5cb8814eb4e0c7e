//! # contract: the narrow seams between publishing logic and the outside world
//!
//! Three traits isolate everything that touches the network or spawns a process:
//! - [`GitHubApi`] fetches a file through the raw-content or contents endpoint.
//! - [`CommandRunner`] runs one external command and reports exit status and output.
//! - [`JobHandler`] is one downstream pipeline, selected by job identifier.
//!
//! ## Mocking & Testing
//! - Each trait is annotated for `mockall`; with the `test-export-mocks` feature
//!   (on by default) dependents get `MockGitHubApi`, `MockCommandRunner` and
//!   `MockJobHandler` for deterministic tests that never hit GitHub or spawn md2conf.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::PublishError;
use crate::request::ConfluenceTarget;

/// A single file in a GitHub repository at a given ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubFile {
    pub owner: String,
    pub repo: String,
    pub reference: String,
    /// Repository-relative path without a leading slash.
    pub path: String,
}

impl GitHubFile {
    /// Last path segment, used as the local file name of a download.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl std::fmt::Display for GitHubFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.reference, self.path)
    }
}

/// What one fetch attempt returned. Non-2xx statuses are data, not errors.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (DNS, TLS, timeout) while talking to GitHub.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// GitHub content retrieval. `token` is sent as a bearer credential when present.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `GET <raw_base>/<owner>/<repo>/<ref>/<path>`: the file's bytes as-is.
    async fn fetch_raw(
        &self,
        file: &GitHubFile,
        token: Option<String>,
    ) -> Result<FetchResponse, FetchError>;

    /// `GET <api_base>/repos/<owner>/<repo>/contents/<path>?ref=<ref>`: JSON
    /// metadata with a base64 `content` field.
    async fn fetch_contents(
        &self,
        file: &GitHubFile,
        token: Option<String>,
    ) -> Result<FetchResponse, FetchError>;
}

/// One fully specified external command.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child, layered over the inherited one.
    pub envs: Vec<(String, String)>,
    pub timeout: Duration,
}

impl CommandSpec {
    /// Program and arguments joined for logging. Environment is left out.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field(
                "envs",
                &self.envs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Exit status and captured streams of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("i/o error while waiting for command: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external commands. Real implementation: [`crate::converter::TokioCommandRunner`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, RunError>;
}

/// Everything a job handler needs for one invocation.
#[derive(Debug, Clone)]
pub struct JobInput {
    /// Local file the converter reads. May point into a temporary directory.
    pub source_path: PathBuf,
    /// The `markdown_path` as the caller supplied it, for messages.
    pub display_name: String,
    pub target: ConfluenceTarget,
}

impl JobInput {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// One downstream processing pipeline, registered under a job identifier.
/// Returns the human-readable success message.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn publish(&self, input: &JobInput) -> Result<String, PublishError>;
}
