#![doc = "md-publish-core: core logic library for md-publish."]

//! This crate contains the request model, source resolution, job dispatch and
//! converter invocation used to publish markdown documents to Confluence.
//! The HTTP surface lives in the `md-publish` crate; nothing here binds a socket.
//!
//! # Usage
//! Build a [`config::PublishConfig`], pick a [`contract::GitHubApi`] and a
//! [`contract::CommandRunner`], and hand them to [`publish::PublishService::new`].

pub mod config;
pub mod contract;
pub mod converter;
pub mod download;
pub mod error;
pub mod jobs;
pub mod publish;
pub mod request;
pub mod source;

pub use error::PublishError;
pub use publish::PublishService;
pub use request::{ErrorCode, PublishRequest, PublishResult};
