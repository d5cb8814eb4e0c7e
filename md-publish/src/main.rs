use anyhow::Result;
use clap::Parser;
use md_publish::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing is installed by `run` once the log settings are known.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    run(cli).await
}
