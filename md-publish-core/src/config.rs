use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Process-wide publishing configuration, fixed at startup and passed into
/// [`crate::publish::PublishService`] explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Base directory for relative local `markdown_path` values.
    pub workspace_dir: Option<PathBuf>,
    pub github: GitHubSettings,
    pub confluence: ConfluenceDefaults,
    pub converter: ConverterSettings,
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            workspace_dir = ?self.workspace_dir,
            default_branch = %self.github.default_branch,
            github_token_set = self.github.token.is_some(),
            converter = %self.converter.program,
            converter_timeout_secs = self.converter.timeout_secs,
            download_timeout_secs = self.github.timeout_secs,
            "Loaded PublishConfig"
        );
        debug!(
            raw_base = %self.github.raw_base,
            api_base = %self.github.api_base,
            confluence_domain = ?self.confluence.domain,
            confluence_space = ?self.confluence.space,
            confluence_username_set = self.confluence.username.is_some(),
            confluence_api_key_set = self.confluence.api_key.is_some(),
            "PublishConfig details"
        );
    }
}

/// Where and how remote markdown is fetched from GitHub.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// Ref used when a request names a `repository` but no `ref`.
    pub default_branch: String,
    /// Fallback bearer token when the request carries none.
    pub token: Option<String>,
    pub raw_base: String,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Upper bound on the upstream body echoed back in `DOWNLOAD_FAILED` messages.
    pub error_body_limit: usize,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            default_branch: "main".to_string(),
            token: None,
            raw_base: "https://raw.githubusercontent.com".to_string(),
            api_base: "https://api.github.com".to_string(),
            timeout_secs: 30,
            error_body_limit: 500,
        }
    }
}

impl GitHubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("default_branch", &self.default_branch)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("raw_base", &self.raw_base)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("error_body_limit", &self.error_body_limit)
            .finish()
    }
}

/// Confluence fields applied when a request leaves them out.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluenceDefaults {
    pub domain: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub root_page: Option<String>,
}

impl std::fmt::Debug for ConfluenceDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluenceDefaults")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("space", &self.space)
            .field("root_page", &self.root_page)
            .finish()
    }
}

/// How the external md2conf converter is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub program: String,
    /// Arguments placed before everything else (e.g. `-m md2conf`).
    pub args: Vec<String>,
    /// Flags appended after the Confluence target arguments.
    pub extra_args: Vec<String>,
    pub dry_run_flag: String,
    pub timeout_secs: u64,
    /// Directories prepended to the child's `PATH`.
    pub extra_path_dirs: Vec<PathBuf>,
    /// Upper bound on the stderr tail echoed back in `CONVERTER_FAILED` messages.
    pub stderr_tail_limit: usize,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["-m".to_string(), "md2conf".to_string()],
            extra_args: vec![
                "--keep-hierarchy".to_string(),
                "--render-mermaid".to_string(),
                "--heading-anchors".to_string(),
            ],
            dry_run_flag: "--local".to_string(),
            timeout_secs: 60,
            extra_path_dirs: Vec::new(),
            stderr_tail_limit: 2000,
        }
    }
}

impl ConverterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
