//! HTTP surface and process entry for md-publish.
//!
//! Routes:
//! - `GET /` and `GET /health`: liveness
//! - `GET /jobs`: supported job identifiers
//! - `POST /publish`: resolve a markdown source and hand it to the converter
//!
//! Business logic lives in `md_publish_core`.

pub mod app;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod load_config;
pub mod state;
pub mod telemetry;

pub use cli::{run, Cli, Commands};
