/// # md-publish CLI
///
/// Process entry for the md-publish HTTP service: argument parsing, config
/// assembly and the async [`run`] entrypoint used by `main` and by tests.
///
/// All publishing logic lives in `md-publish-core`; this module only wires
/// configuration, telemetry and the server together.
use crate::app;
use crate::load_config::{load_config, ServiceConfig};
use crate::telemetry;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for md-publish: serve the markdown-to-Confluence publishing API.
#[derive(Parser, Debug)]
#[clap(
    name = "md-publish",
    version,
    about = "HTTP service that publishes markdown documents to Confluence"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
        /// Address to bind, overrides config and MD_PUBLISH_HOST
        #[clap(long)]
        host: Option<String>,
        /// Port to listen on, overrides config and PORT
        #[clap(long)]
        port: Option<u16>,
        /// Log filter such as `info` or `md_publish=debug`
        #[clap(long)]
        log_level: Option<String>,
    },
}

/// Apply command-line flags, the last configuration layer.
pub fn apply_flags(
    config: &mut ServiceConfig,
    host: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(level) = log_level {
        config.logging.level = level;
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            log_level,
        } => {
            let mut service_config = load_config(config.as_deref())?;
            apply_flags(&mut service_config, host, port, log_level);
            telemetry::init(&service_config.logging)?;
            tracing::info!(command = "serve", "trace_initialised");
            service_config.trace_loaded();

            let result = app::run_server(service_config).await;
            if let Err(e) = &result {
                tracing::error!(command = "serve", error = %e, "Server exited with error");
            }
            result
        }
    }
}
