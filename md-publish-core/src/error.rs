use thiserror::Error;

use crate::request::{ErrorCode, PublishResult};

/// Every way a publish request can fail. Each variant maps to exactly one
/// [`ErrorCode`] so callers always receive a stable `error` value.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Unsupported job type: '{supplied}'. Supported types: {}", .supported.join(", "))]
    InvalidJobType {
        supplied: String,
        supported: Vec<String>,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("Markdown source not found: {0}")]
    SourceNotFound(String),
    #[error("Failed to download {location}: {}", describe_download(.status, .body))]
    DownloadFailed {
        location: String,
        status: Option<u16>,
        body: String,
    },
    #[error("Converter exited with {}: {stderr_tail}", describe_exit(.exit_code))]
    ConverterFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },
    #[error("Converter could not be launched: {0}")]
    ConverterUnavailable(String),
    #[error("Converter did not finish within {0} seconds")]
    ConverterTimeout(u64),
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_download(status: &Option<u16>, body: &str) -> String {
    match *status {
        Some(status) if body.is_empty() => format!("HTTP {status}"),
        Some(status) => format!("HTTP {status}: {body}"),
        None => body.to_string(),
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match *exit_code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl PublishError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PublishError::InvalidJobType { .. } => ErrorCode::InvalidJobType,
            PublishError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            PublishError::MissingParameters(_) => ErrorCode::MissingParameters,
            PublishError::SourceNotFound(_) => ErrorCode::SourceNotFound,
            PublishError::DownloadFailed { .. } => ErrorCode::DownloadFailed,
            PublishError::ConverterFailed { .. } => ErrorCode::ConverterFailed,
            PublishError::ConverterUnavailable(_) => ErrorCode::ConverterUnavailable,
            PublishError::ConverterTimeout(_) => ErrorCode::ConverterTimeout,
            PublishError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn into_result(self) -> PublishResult {
        PublishResult::failed(self.code(), self.to_string())
    }
}

impl From<std::io::Error> for PublishError {
    fn from(e: std::io::Error) -> Self {
        PublishError::Internal(e.to_string())
    }
}

/// Keep at most the last `limit` characters of `text`, on a char boundary.
pub fn tail(text: &str, limit: usize) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= limit {
        return trimmed.to_string();
    }
    let skip = count - limit;
    let mut out = String::from("...");
    out.extend(trimmed.chars().skip(skip));
    out
}

/// Keep at most the first `limit` characters of `text`, on a char boundary.
pub fn head(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= limit {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(limit).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_job_message_lists_supported_types() {
        let err = PublishError::InvalidJobType {
            supplied: "bogus".into(),
            supported: vec!["md2conf".into()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported job type: 'bogus'. Supported types: md2conf"
        );
        let result = err.into_result();
        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorCode::InvalidJobType));
    }

    #[test]
    fn download_failure_carries_status_and_body() {
        let err = PublishError::DownloadFailed {
            location: "o/r@main:docs/x.md".into(),
            status: Some(404),
            body: "Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to download o/r@main:docs/x.md: HTTP 404: Not Found"
        );
        assert_eq!(err.code(), ErrorCode::DownloadFailed);
    }

    #[test]
    fn tail_keeps_the_end_and_respects_char_boundaries() {
        assert_eq!(tail("short\n", 10), "short");
        assert_eq!(tail("abcdefghij", 4), "...ghij");
        assert_eq!(tail("ééééé", 2), "...éé");
    }

    #[test]
    fn head_keeps_the_start() {
        assert_eq!(head("  body  ", 10), "body");
        assert_eq!(head("abcdefghij", 3), "abc...");
    }
}
