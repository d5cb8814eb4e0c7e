//! Exercises the reqwest-backed GitHub client against a local fake server.

use md_publish_core::config::{GitHubSettings, PublishConfig};
use md_publish_core::contract::{GitHubApi, GitHubFile};
use md_publish_core::download::GitHubClient;
use md_publish_core::source::SourceResolver;
use md_publish_core::{ErrorCode, PublishError, PublishRequest};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> GitHubSettings {
    GitHubSettings {
        raw_base: format!("{}/raw", server.uri()),
        api_base: format!("{}/api", server.uri()),
        timeout_secs: 5,
        ..Default::default()
    }
}

fn file() -> GitHubFile {
    GitHubFile {
        owner: "o".into(),
        repo: "r".into(),
        reference: "main".into(),
        path: "docs/x.md".into(),
    }
}

#[tokio::test]
async fn raw_fetch_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw/o/r/main/docs/x.md"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Raw\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&settings_for(&server)).unwrap();
    let resp = client.fetch_raw(&file(), Some("tok".into())).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, b"# Raw\n");
}

#[tokio::test]
async fn contents_fetch_passes_ref_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/repos/o/r/contents/docs/x.md"))
        .and(query_param("ref", "main"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"content":"IyBSYXcK","encoding":"base64"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GitHubClient::new(&settings_for(&server)).unwrap();
    let resp = client.fetch_contents(&file(), None).await.unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn resolver_falls_back_and_writes_a_temporary_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/raw/o/r/main/docs/x.md"))
        .respond_with(ResponseTemplate::new(404).set_body_string("404: Not Found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/repos/o/r/contents/docs/x.md"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"content":"IyBSYXcK","encoding":"base64"}"#),
        )
        .mount(&server)
        .await;

    let config = PublishConfig {
        github: settings_for(&server),
        ..Default::default()
    };
    let client = GitHubClient::new(&config.github).unwrap();
    let resolver = SourceResolver::new(Arc::new(client), Arc::new(config));
    let request = PublishRequest {
        markdown_path: "docs/x.md".into(),
        repository: Some("o/r".into()),
        ..Default::default()
    };

    let resolved = resolver.resolve(&request).await.unwrap();
    assert!(resolved.is_temporary());
    let path = resolved.path().to_path_buf();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Raw\n");
    drop(resolved);
    assert!(!path.exists());
}

#[tokio::test]
async fn resolver_reports_download_failed_when_both_endpoints_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let config = PublishConfig {
        github: settings_for(&server),
        ..Default::default()
    };
    let client = GitHubClient::new(&config.github).unwrap();
    let resolver = SourceResolver::new(Arc::new(client), Arc::new(config));
    let request = PublishRequest {
        markdown_path: "https://github.com/o/r/blob/main/docs/x.md".into(),
        ..Default::default()
    };

    let err = resolver.resolve(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DownloadFailed);
    match err {
        PublishError::DownloadFailed { status, body, .. } => {
            assert_eq!(status, Some(500));
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
