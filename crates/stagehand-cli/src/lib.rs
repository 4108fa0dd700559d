//! stagehand CLI definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod cmd;

/// Package a compiled program's output tree plus an engine installation
/// into a platform-correct distributable layout.
#[derive(Debug, Parser)]
#[command(name = "stagehand", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared inputs for resolution.
#[derive(Debug, clap::Args)]
pub struct ResolveArgs {
    /// Root of the compiled program's output tree.
    #[arg(long)]
    pub source: PathBuf,

    /// Root of the engine installation.
    #[arg(long)]
    pub engine: PathBuf,

    /// Target platform (windows, mac, linux, ios, tvos).
    #[arg(long)]
    pub platform: String,

    /// Path to a `<Target>.target` descriptor. When omitted, a single
    /// `*.target` file at the top of the source tree is used if present.
    #[arg(long = "target-file")]
    pub target_file: Option<PathBuf>,

    /// Path to a manifest-override JSON file.
    #[arg(long = "override")]
    pub override_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve and stage a package into the destination directory.
    Package {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Destination root. Defaults to `Package/` next to the source tree.
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Worker pool size. Defaults to the CPU count.
        #[arg(long)]
        jobs: Option<usize>,

        /// Write the staging report JSON here instead of stdout.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Resolve a manifest and print it as JSON without writing anything.
    Resolve {
        #[command(flatten)]
        resolve: ResolveArgs,
    },
    /// List supported platforms and their staging rules.
    Platforms,
}
