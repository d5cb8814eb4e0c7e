//! Request and response model for a single publish call.
//!
//! [`PublishRequest`] is what the HTTP surface deserializes; [`PublishResult`]
//! is what it serializes back, on success and failure alike. Neither outlives
//! the request that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfluenceDefaults;
use crate::error::PublishError;

/// A request to publish one markdown document.
///
/// `markdown_path` is a local path, a GitHub blob URL, a GitHub raw URL, or a
/// repository-relative path when `repository` is set. The Confluence fields
/// accept both the short names and the long aliases used by older callers.
#[derive(Clone, Default, Deserialize)]
pub struct PublishRequest {
    pub markdown_path: String,
    #[serde(default)]
    pub job: Option<String>,
    /// `owner/name`
    #[serde(default)]
    pub repository: Option<String>,
    /// Branch, tag or commit.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default, alias = "confluence_base_url")]
    pub domain: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "password")]
    pub api_key: Option<String>,
    #[serde(default, alias = "space_key")]
    pub space: Option<String>,
    #[serde(default, alias = "parent_page_id")]
    pub root_page: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("markdown_path", &self.markdown_path)
            .field("job", &self.job)
            .field("repository", &self.repository)
            .field("reference", &self.reference)
            .field("github_token_set", &self.github_token.is_some())
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("api_key_set", &self.api_key.is_some())
            .field("space", &self.space)
            .field("root_page", &self.root_page)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Stable, machine-readable failure codes carried in [`PublishResult::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJobType,
    InvalidRequest,
    MissingParameters,
    SourceNotFound,
    DownloadFailed,
    ConverterFailed,
    ConverterUnavailable,
    ConverterTimeout,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidJobType => "INVALID_JOB_TYPE",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MissingParameters => "MISSING_PARAMETERS",
            ErrorCode::SourceNotFound => "SOURCE_NOT_FOUND",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::ConverterFailed => "CONVERTER_FAILED",
            ErrorCode::ConverterUnavailable => "CONVERTER_UNAVAILABLE",
            ErrorCode::ConverterTimeout => "CONVERTER_TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one publish request. `error` is serialized as `null` on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub success: bool,
    pub message: String,
    pub error: Option<ErrorCode>,
}

impl PublishResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(code),
        }
    }
}

/// Fully merged Confluence destination handed to a job handler.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfluenceTarget {
    /// Bare host, e.g. `example.atlassian.net`.
    pub domain: Option<String>,
    /// Path prefix taken from a base URL, e.g. `/wiki/`.
    pub path: Option<String>,
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub space: Option<String>,
    pub root_page: Option<String>,
    pub dry_run: bool,
}

impl fmt::Debug for ConfluenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceTarget")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("username", &self.username)
            .field("api_key_set", &self.api_key.is_some())
            .field("space", &self.space)
            .field("root_page", &self.root_page)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ConfluenceTarget {
    /// Merge request fields over configured defaults.
    ///
    /// Outside a dry run the domain, username, API key and space are all
    /// required; a dry run leaves validation of whatever is present to the
    /// converter.
    pub fn from_request(
        request: &PublishRequest,
        defaults: &ConfluenceDefaults,
    ) -> Result<Self, PublishError> {
        let pick = |own: &Option<String>, fallback: &Option<String>| {
            non_empty(own).or_else(|| non_empty(fallback))
        };

        let raw_domain = pick(&request.domain, &defaults.domain);
        let username = pick(&request.username, &defaults.username);
        let api_key = pick(&request.api_key, &defaults.api_key);
        let space = pick(&request.space, &defaults.space);
        let root_page = pick(&request.root_page, &defaults.root_page);

        if !request.dry_run {
            let missing: Vec<&'static str> = [
                ("domain", raw_domain.is_none()),
                ("username", username.is_none()),
                ("api_key", api_key.is_none()),
                ("space", space.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            if !missing.is_empty() {
                return Err(PublishError::MissingParameters(missing));
            }
        }

        let (domain, path) = match raw_domain {
            Some(raw) => {
                let (domain, path) = split_base_url(&raw)?;
                (Some(domain), path)
            }
            None => (None, None),
        };

        Ok(Self {
            domain,
            path,
            username,
            api_key,
            space,
            root_page,
            dry_run: request.dry_run,
        })
    }
}

/// Accepts `example.atlassian.net`, `example.atlassian.net/wiki` or
/// `https://example.atlassian.net/wiki` and returns host plus optional path.
fn split_base_url(raw: &str) -> Result<(String, Option<String>), PublishError> {
    let (host, path) = if raw.contains("://") {
        let url = reqwest::Url::parse(raw).map_err(|e| {
            PublishError::InvalidRequest(format!("invalid Confluence base URL '{raw}': {e}"))
        })?;
        let host = url.host_str().ok_or_else(|| {
            PublishError::InvalidRequest(format!("Confluence base URL '{raw}' has no host"))
        })?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        (host, url.path().to_string())
    } else {
        match raw.split_once('/') {
            Some((host, rest)) => (host.to_string(), format!("/{rest}")),
            None => (raw.to_string(), String::new()),
        }
    };

    let trimmed = path.trim_matches('/');
    let path = (!trimmed.is_empty()).then(|| format!("/{trimmed}/"));
    Ok((host, path))
}
