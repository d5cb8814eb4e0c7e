//! Source Resolver: turns the addressing fields of a [`PublishRequest`] into a
//! local file the converter can read.
//!
//! Addressing schemes, checked in order:
//! 1. `markdown_path` is a GitHub blob URL or raw URL: owner, repo, ref and
//!    path come from the URL.
//! 2. `repository` is set: `markdown_path` is repository-relative and `ref`
//!    defaults to the configured branch.
//! 3. Otherwise `markdown_path` is a local file.
//!
//! Remote files are downloaded into a per-request [`tempfile::TempDir`] owned by
//! the returned [`ResolvedSource`]; dropping it removes the download on every
//! exit path.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::PublishConfig;
use crate::contract::{GitHubApi, GitHubFile};
use crate::download;
use crate::error::PublishError;
use crate::request::PublishRequest;

static BLOB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/]+)/([^/]+)/blob/([^/]+)/(.+)$")
        .expect("static blob URL pattern")
});

static RAW_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://raw\.githubusercontent\.com/([^/]+)/([^/]+)/(?:refs/(?:heads|tags)/)?([^/]+)/(.+)$",
    )
        .expect("static raw URL pattern")
});

static REPOSITORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?$").expect("static repository pattern")
});

/// Where a request's markdown lives, before anything is read or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    GitHub(GitHubFile),
}

/// Parse a GitHub blob URL (`github.com/<o>/<r>/blob/<ref>/<path>`) or raw URL
/// (`raw.githubusercontent.com/<o>/<r>/<ref>/<path>`). Query and fragment are
/// ignored. Returns `None` for anything else.
pub fn parse_github_url(input: &str) -> Option<GitHubFile> {
    let input = input.trim();
    let without_fragment = input.split('#').next().unwrap_or(input);
    let clean = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);

    let captures = BLOB_URL
        .captures(clean)
        .or_else(|| RAW_URL.captures(clean))?;

    let path = captures[4].trim_matches('/').to_string();
    if path.is_empty() {
        return None;
    }
    Some(GitHubFile {
        owner: captures[1].to_string(),
        repo: captures[2].to_string(),
        reference: captures[3].to_string(),
        path,
    })
}

fn parse_repository(repository: &str) -> Result<(String, String), PublishError> {
    let captures = REPOSITORY.captures(repository.trim()).ok_or_else(|| {
        PublishError::InvalidRequest(format!(
            "repository must look like 'owner/name', got '{repository}'"
        ))
    })?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}

/// Decide the addressing scheme without touching the filesystem or network.
pub fn locate(
    request: &PublishRequest,
    config: &PublishConfig,
) -> Result<SourceLocation, PublishError> {
    let markdown_path = request.markdown_path.trim();
    if markdown_path.is_empty() {
        return Err(PublishError::InvalidRequest(
            "markdown_path must not be empty".to_string(),
        ));
    }

    if let Some(file) = parse_github_url(markdown_path) {
        return Ok(SourceLocation::GitHub(file));
    }

    if markdown_path.starts_with("http://") || markdown_path.starts_with("https://") {
        return Err(PublishError::InvalidRequest(format!(
            "'{markdown_path}' is not a GitHub blob or raw URL"
        )));
    }

    if let Some(repository) = request.repository.as_deref().filter(|r| !r.trim().is_empty()) {
        let (owner, repo) = parse_repository(repository)?;
        let reference = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&config.github.default_branch)
            .to_string();
        let path = markdown_path
            .trim_start_matches("./")
            .trim_start_matches('/')
            .to_string();
        if path.is_empty() {
            return Err(PublishError::InvalidRequest(
                "markdown_path must name a file inside the repository".to_string(),
            ));
        }
        return Ok(SourceLocation::GitHub(GitHubFile {
            owner,
            repo,
            reference,
            path,
        }));
    }

    let path = PathBuf::from(markdown_path);
    let path = match (&config.workspace_dir, path.is_relative()) {
        (Some(workspace), true) => workspace.join(path),
        _ => path,
    };
    Ok(SourceLocation::Local(path))
}

/// A local markdown file ready for the converter.
///
/// For downloads the file sits in a temporary directory owned by this value;
/// the directory and the file are deleted exactly once, when it is dropped.
/// Pre-existing local files are never touched.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    temp_dir: Option<TempDir>,
}

impl ResolvedSource {
    pub fn local(path: PathBuf) -> Self {
        Self {
            path,
            temp_dir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp_dir.is_some()
    }
}

impl Drop for ResolvedSource {
    fn drop(&mut self) {
        if self.temp_dir.is_some() {
            debug!(path = %self.path.display(), "Removing downloaded markdown");
        }
    }
}

/// Materializes a [`SourceLocation`] as a [`ResolvedSource`].
pub struct SourceResolver {
    github: Arc<dyn GitHubApi>,
    config: Arc<PublishConfig>,
}

impl SourceResolver {
    pub fn new(github: Arc<dyn GitHubApi>, config: Arc<PublishConfig>) -> Self {
        Self { github, config }
    }

    /// Resolve the request's markdown, downloading it when it is remote.
    pub async fn resolve(&self, request: &PublishRequest) -> Result<ResolvedSource, PublishError> {
        let location = locate(request, &self.config)?;
        self.materialize(location, request.github_token.as_deref())
            .await
    }

    pub async fn materialize(
        &self,
        location: SourceLocation,
        request_token: Option<&str>,
    ) -> Result<ResolvedSource, PublishError> {
        match location {
            SourceLocation::Local(path) => self.check_local(path).await,
            SourceLocation::GitHub(file) => {
                let token = request_token
                    .filter(|t| !t.trim().is_empty())
                    .map(str::to_string)
                    .or_else(|| self.config.github.token.clone());
                info!(
                    source = %file,
                    token_set = token.is_some(),
                    "Downloading markdown from GitHub"
                );
                let bytes = download::fetch_markdown(
                    self.github.as_ref(),
                    &file,
                    token,
                    self.config.github.error_body_limit,
                )
                .await?;
                self.write_temporary(&file, &bytes).await
            }
        }
    }

    /// Confirm a local source exists and, when a workspace is configured, that
    /// it lies inside the workspace after resolving `..` and symlinks.
    pub async fn check_local(&self, path: PathBuf) -> Result<ResolvedSource, PublishError> {
        // Directories are passed through; the converter publishes them recursively.
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| PublishError::SourceNotFound(path.display().to_string()))?;

        if let Some(workspace) = &self.config.workspace_dir {
            let root = tokio::fs::canonicalize(workspace).await.map_err(|e| {
                PublishError::Internal(format!(
                    "workspace directory {} is not accessible: {e}",
                    workspace.display()
                ))
            })?;
            let real = tokio::fs::canonicalize(&path).await?;
            if !real.starts_with(&root) {
                warn!(
                    path = %path.display(),
                    workspace = %root.display(),
                    "Rejected local source outside the workspace"
                );
                return Err(PublishError::InvalidRequest(format!(
                    "'{}' is outside the workspace directory",
                    path.display()
                )));
            }
        }

        info!(path = %path.display(), is_dir = meta.is_dir(), "Using local markdown source");
        Ok(ResolvedSource::local(path))
    }

    async fn write_temporary(
        &self,
        file: &GitHubFile,
        bytes: &[u8],
    ) -> Result<ResolvedSource, PublishError> {
        let temp_dir = tempfile::Builder::new().prefix("md-publish-").tempdir()?;
        let path = temp_dir.path().join(file.file_name());
        // From here on the TempDir owns cleanup, including when the write fails.
        tokio::fs::write(&path, bytes).await?;
        info!(
            source = %file,
            path = %path.display(),
            bytes = bytes.len(),
            "Wrote downloaded markdown to temporary file"
        );
        Ok(ResolvedSource {
            path,
            temp_dir: Some(temp_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(markdown_path: &str) -> PublishRequest {
        PublishRequest {
            markdown_path: markdown_path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_blob_url() {
        let file = parse_github_url("https://github.com/o/r/blob/main/docs/x.md").unwrap();
        assert_eq!(
            file,
            GitHubFile {
                owner: "o".into(),
                repo: "r".into(),
                reference: "main".into(),
                path: "docs/x.md".into(),
            }
        );
    }

    #[test]
    fn parses_raw_url_and_ignores_query() {
        let file = parse_github_url(
            "https://raw.githubusercontent.com/acme/handbook/v1.2/guides/setup.md?token=abc",
        )
        .unwrap();
        assert_eq!(file.owner, "acme");
        assert_eq!(file.repo, "handbook");
        assert_eq!(file.reference, "v1.2");
        assert_eq!(file.path, "guides/setup.md");
        assert_eq!(file.file_name(), "setup.md");
    }

    #[test]
    fn raw_url_with_full_ref_prefix_keeps_the_short_ref() {
        let file =
            parse_github_url("https://raw.githubusercontent.com/o/r/refs/heads/main/docs/x.md")
                .unwrap();
        assert_eq!(file.reference, "main");
        assert_eq!(file.path, "docs/x.md");

        let file =
            parse_github_url("https://raw.githubusercontent.com/o/r/refs/tags/v2.0/README.md")
                .unwrap();
        assert_eq!(file.reference, "v2.0");
        assert_eq!(file.path, "README.md");
    }

    #[test]
    fn blob_url_with_fragment_and_www() {
        let file = parse_github_url("https://www.github.com/o/r/blob/abc123/README.md#L10").unwrap();
        assert_eq!(file.reference, "abc123");
        assert_eq!(file.path, "README.md");
    }

    #[test]
    fn non_github_inputs_do_not_parse() {
        for input in [
            "docs/x.md",
            "https://github.com/o/r",
            "https://github.com/o/r/tree/main/docs",
            "https://gitlab.com/o/r/blob/main/x.md",
        ] {
            assert!(parse_github_url(input).is_none(), "{input} should not parse");
        }
    }

    #[test]
    fn repository_field_makes_path_remote_with_default_branch() {
        let mut config = PublishConfig::default();
        config.github.default_branch = "trunk".into();
        let mut req = request("/docs/x.md");
        req.repository = Some("o/r".into());
        match locate(&req, &config).unwrap() {
            SourceLocation::GitHub(file) => {
                assert_eq!(file.owner, "o");
                assert_eq!(file.repo, "r");
                assert_eq!(file.reference, "trunk");
                assert_eq!(file.path, "docs/x.md");
            }
            other => panic!("expected GitHub location, got {other:?}"),
        }
    }

    #[test]
    fn explicit_ref_wins_over_default_branch() {
        let mut req = request("docs/x.md");
        req.repository = Some("o/r.git".into());
        req.reference = Some("release-1".into());
        match locate(&req, &PublishConfig::default()).unwrap() {
            SourceLocation::GitHub(file) => {
                assert_eq!(file.repo, "r");
                assert_eq!(file.reference, "release-1");
            }
            other => panic!("expected GitHub location, got {other:?}"),
        }
    }

    #[test]
    fn url_wins_over_repository_field() {
        let mut req = request("https://github.com/o/r/blob/dev/a.md");
        req.repository = Some("other/repo".into());
        match locate(&req, &PublishConfig::default()).unwrap() {
            SourceLocation::GitHub(file) => {
                assert_eq!(file.owner, "o");
                assert_eq!(file.reference, "dev");
            }
            other => panic!("expected GitHub location, got {other:?}"),
        }
    }

    #[test]
    fn incoherent_addressing_is_rejected() {
        let config = PublishConfig::default();

        let err = locate(&request("  "), &config).unwrap_err();
        assert!(matches!(err, PublishError::InvalidRequest(_)));

        let err = locate(&request("https://example.com/x.md"), &config).unwrap_err();
        assert!(matches!(err, PublishError::InvalidRequest(_)));

        let mut req = request("docs/x.md");
        req.repository = Some("not a repo".into());
        let err = locate(&req, &config).unwrap_err();
        assert!(matches!(err, PublishError::InvalidRequest(_)));
    }

    fn resolver_for(workspace: &Path) -> SourceResolver {
        let config = PublishConfig {
            workspace_dir: Some(workspace.to_path_buf()),
            ..Default::default()
        };
        SourceResolver::new(
            Arc::new(crate::contract::MockGitHubApi::new()),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn local_sources_must_stay_inside_the_workspace() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.md");
        std::fs::write(&secret, "# not for publishing\n").unwrap();

        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join("inside.md"), "# ok\n").unwrap();
        let resolver = resolver_for(workspace.path());

        let err = resolver.check_local(secret.clone()).await.unwrap_err();
        assert!(matches!(err, PublishError::InvalidRequest(_)), "{err:?}");

        let escaping = workspace
            .path()
            .join("..")
            .join(outside.path().file_name().unwrap())
            .join("secret.md");
        if escaping.exists() {
            let err = resolver.check_local(escaping).await.unwrap_err();
            assert!(matches!(err, PublishError::InvalidRequest(_)), "{err:?}");
        }

        let resolved = resolver
            .check_local(workspace.path().join("inside.md"))
            .await
            .unwrap();
        assert!(!resolved.is_temporary());
    }

    #[tokio::test]
    async fn missing_local_source_is_not_found() {
        let workspace = tempfile::tempdir().unwrap();
        let err = resolver_for(workspace.path())
            .check_local(workspace.path().join("missing.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::SourceNotFound(_)));
    }

    #[test]
    fn relative_local_paths_join_the_workspace() {
        let config = PublishConfig {
            workspace_dir: Some(PathBuf::from("/github/workspace")),
            ..Default::default()
        };
        assert_eq!(
            locate(&request("docs/x.md"), &config).unwrap(),
            SourceLocation::Local(PathBuf::from("/github/workspace/docs/x.md"))
        );
        assert_eq!(
            locate(&request("/abs/x.md"), &config).unwrap(),
            SourceLocation::Local(PathBuf::from("/abs/x.md"))
        );
    }
}
