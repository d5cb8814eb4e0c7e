use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::GitHubSettings;
use crate::contract::{FetchError, FetchResponse, GitHubApi, GitHubFile};
use crate::error::{head, PublishError};

/// One failed attempt, kept for the final `DOWNLOAD_FAILED` report.
struct Attempt {
    status: Option<u16>,
    body: String,
}

impl Attempt {
    fn from_response(resp: &FetchResponse, limit: usize) -> Self {
        Self {
            status: Some(resp.status),
            body: head(&String::from_utf8_lossy(&resp.body), limit),
        }
    }

    fn from_error(e: &FetchError, limit: usize) -> Self {
        Self {
            status: None,
            body: head(&e.to_string(), limit),
        }
    }
}

/// Download one file: raw-content endpoint first, contents API as fallback.
///
/// Any non-2xx answer (or transport error) from both endpoints is reported
/// uniformly as [`PublishError::DownloadFailed`], carrying the last status seen
/// and a truncated body.
pub async fn fetch_markdown(
    api: &dyn GitHubApi,
    file: &GitHubFile,
    token: Option<String>,
    body_limit: usize,
) -> Result<Vec<u8>, PublishError> {
    let raw_attempt = match api.fetch_raw(file, token.clone()).await {
        Ok(resp) if resp.is_success() => {
            info!(source = %file, bytes = resp.body.len(), "Fetched raw content");
            return Ok(resp.body);
        }
        Ok(resp) => {
            warn!(source = %file, status = resp.status, "Raw content fetch failed, falling back to contents API");
            Attempt::from_response(&resp, body_limit)
        }
        Err(e) => {
            warn!(source = %file, error = %e, "Raw content request failed, falling back to contents API");
            Attempt::from_error(&e, body_limit)
        }
    };

    let contents_attempt = match api.fetch_contents(file, token).await {
        Ok(resp) if resp.is_success() => match decode_contents(&resp.body) {
            Ok(bytes) => {
                info!(source = %file, bytes = bytes.len(), "Fetched content via contents API");
                return Ok(bytes);
            }
            Err(reason) => {
                warn!(source = %file, reason = %reason, "Contents API returned an undecodable payload");
                Attempt {
                    status: Some(resp.status),
                    body: head(&reason, body_limit),
                }
            }
        },
        Ok(resp) => Attempt::from_response(&resp, body_limit),
        Err(e) => Attempt::from_error(&e, body_limit),
    };

    error!(
        source = %file,
        raw_status = ?raw_attempt.status,
        contents_status = ?contents_attempt.status,
        "Both GitHub download strategies failed"
    );

    let last = if contents_attempt.status.is_some() || raw_attempt.status.is_none() {
        contents_attempt
    } else {
        raw_attempt
    };
    Err(PublishError::DownloadFailed {
        location: file.to_string(),
        status: last.status,
        body: last.body,
    })
}

#[derive(Deserialize)]
struct ContentsPayload {
    content: Option<String>,
    encoding: Option<String>,
}

/// Decode a contents-API JSON body into the file's bytes.
pub fn decode_contents(body: &[u8]) -> Result<Vec<u8>, String> {
    let payload: ContentsPayload = serde_json::from_slice(body)
        .map_err(|e| format!("contents API body is not the expected JSON: {e}"))?;
    let content = payload
        .content
        .ok_or_else(|| "contents API body has no 'content' field".to_string())?;
    match payload.encoding.as_deref() {
        None | Some("base64") => {}
        Some(other) => return Err(format!("unsupported contents encoding '{other}'")),
    }
    // GitHub wraps the base64 payload at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| format!("contents API payload is not valid base64: {e}"))
}

/// reqwest-backed [`GitHubApi`].
pub struct GitHubClient {
    client: Client,
    raw_base: String,
    api_base: String,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| PublishError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            raw_base: settings.raw_base.trim_end_matches('/').to_string(),
            api_base: settings.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn raw_url(&self, file: &GitHubFile) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, file.owner, file.repo, file.reference, file.path
        )
    }

    pub fn contents_url(&self, file: &GitHubFile) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, file.owner, file.repo, file.path
        )
    }

    async fn get(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> Result<FetchResponse, FetchError> {
        let request = request.header(USER_AGENT, concat!("md-publish/", env!("CARGO_PKG_VERSION")));
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let resp = request.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(FetchResponse { status, body })
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn fetch_raw(
        &self,
        file: &GitHubFile,
        token: Option<String>,
    ) -> Result<FetchResponse, FetchError> {
        let url = self.raw_url(file);
        info!(url = %url, "Fetching raw GitHub content");
        self.get(self.client.get(&url), token).await
    }

    async fn fetch_contents(
        &self,
        file: &GitHubFile,
        token: Option<String>,
    ) -> Result<FetchResponse, FetchError> {
        let url = self.contents_url(file);
        info!(url = %url, reference = %file.reference, "Fetching GitHub contents API");
        let request = self
            .client
            .get(&url)
            .query(&[("ref", file.reference.as_str())])
            .header(ACCEPT, "application/vnd.github+json");
        self.get(request, token).await
    }
}
