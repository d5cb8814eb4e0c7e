use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub supported_jobs: Vec<String>,
}

/// `GET /jobs`
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobsResponse> {
    Json(JobsResponse {
        supported_jobs: state.service.supported_jobs(),
    })
}
