//! Application state.
//!
//! Shared, read-only state for all request handlers.

use md_publish_core::PublishService;

/// Application state shared across all handlers.
pub struct AppState {
    /// Per-request publish orchestration, built once from startup config.
    pub service: PublishService,
}

impl AppState {
    pub fn new(service: PublishService) -> Self {
        Self { service }
    }
}
