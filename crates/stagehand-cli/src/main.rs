//! stagehand - program packaging CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stagehand_cli::{Cli, Commands, cmd};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package {
            resolve,
            dest,
            jobs,
            report,
        } => cmd::package::package(resolve, dest, jobs, report).await,
        Commands::Resolve { resolve } => cmd::resolve::resolve(resolve).await,
        Commands::Platforms => {
            cmd::platforms::platforms();
            Ok(())
        }
    }
}
