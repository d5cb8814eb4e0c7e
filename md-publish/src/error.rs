//! Mapping of publish failures onto HTTP responses.
//!
//! Every response body, failure or not, has the [`PublishResult`] shape.
//! Failures detected before any download or subprocess get a 4xx status;
//! failures after a side effect began are "handled" and answer 200 with
//! `success: false`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use md_publish_core::{ErrorCode, PublishError, PublishResult};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    result: PublishResult,
}

impl ApiError {
    pub fn new(status: StatusCode, result: PublishResult) -> Self {
        Self { status, result }
    }

    /// The request body could not be read as a publish request.
    pub fn from_rejection(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PublishResult::failed(ErrorCode::InvalidRequest, rejection.body_text()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn result(&self) -> &PublishResult {
        &self.result
    }
}

/// HTTP status for a failure code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidJobType | ErrorCode::InvalidRequest | ErrorCode::MissingParameters => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::SourceNotFound => StatusCode::NOT_FOUND,
        ErrorCode::DownloadFailed
        | ErrorCode::ConverterFailed
        | ErrorCode::ConverterUnavailable
        | ErrorCode::ConverterTimeout
        | ErrorCode::InternalError => StatusCode::OK,
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        let status = status_for(err.code());
        Self::new(status, err.into_result())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.result)).into_response()
    }
}
