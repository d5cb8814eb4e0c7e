//! `POST /publish`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use md_publish_core::jobs::DEFAULT_JOB;
use md_publish_core::{PublishError, PublishRequest, PublishResult};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// The publish runs on its own task: once dispatched it finishes or hits its
/// own timeout even if the client disconnects and this handler is dropped.
pub async fn publish(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected unreadable publish request body");
        ApiError::from_rejection(rejection)
    })?;

    let span = info_span!(
        "publish",
        request_id = %Uuid::new_v4(),
        job = request.job.as_deref().unwrap_or(DEFAULT_JOB)
    );

    let task = tokio::spawn(
        async move {
            info!(
                markdown_path = %request.markdown_path,
                repository = ?request.repository,
                dry_run = request.dry_run,
                "Received publish request"
            );
            state.service.publish(&request).await
        }
        .instrument(span),
    );

    match task.await {
        Ok(Ok(message)) => Ok(Json(PublishResult::succeeded(message))),
        Ok(Err(e)) => Err(ApiError::from(e)),
        Err(join_error) => {
            error!(error = %join_error, "Publish task did not complete");
            Err(ApiError::from(PublishError::Internal(format!(
                "publish task did not complete: {join_error}"
            ))))
        }
    }
}
