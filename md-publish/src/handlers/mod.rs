//! HTTP request handlers.

pub mod jobs;
pub mod publish;
pub mod status;
