//! `stagehand package` - resolve and stage a distributable.

use crate::ResolveArgs;
use crate::cmd::{build_request, default_destination};
use anyhow::{Context, Result, bail};
use stagehand_core::SessionController;
use stagehand_schema::{ItemResult, RunStatus, StagingOutcome};
use std::path::PathBuf;
use tokio_stream::StreamExt;
use tracing::warn;

fn render_outcome(outcome: &StagingOutcome) {
    let dest = outcome.destination.display();
    match &outcome.result {
        ItemResult::Succeeded => println!("  staged   {dest}"),
        ItemResult::Skipped { reason } => println!("  skipped  {dest} ({reason})"),
        ItemResult::Failed { error } => println!("  FAILED   {dest}: {error}"),
    }
}

pub async fn package(
    args: ResolveArgs,
    dest: Option<PathBuf>,
    jobs: Option<usize>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let destination = dest.unwrap_or_else(|| default_destination(&args.source));
    let request = build_request(&args, destination.clone(), jobs).await?;

    println!(
        "Packaging {} for {} into {}",
        args.source.display(),
        args.platform,
        destination.display()
    );

    let mut handle = SessionController::start(request).context("failed to start packaging run")?;
    let mut progress = handle
        .progress()
        .context("progress stream already taken")?;

    // Ctrl-C cancels cooperatively; already-staged items remain.
    let mut cancelled = false;
    loop {
        tokio::select! {
            outcome = progress.next() => match outcome {
                Some(outcome) => render_outcome(&outcome),
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancelled => {
                warn!("cancellation requested, finishing in-flight items");
                handle.cancel();
                cancelled = true;
            }
        }
    }

    let report = handle.wait().await?;
    let json = serde_json::to_string_pretty(&report).context("serializing staging report")?;
    match &report_path {
        Some(path) => {
            tokio::fs::write(path, &json)
                .await
                .with_context(|| format!("writing report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    match report.status {
        RunStatus::Complete => {
            println!("Package complete: {} item(s)", report.items.len());
            Ok(())
        }
        RunStatus::Cancelled => {
            println!("Run cancelled; staged items were kept");
            Ok(())
        }
        RunStatus::Incomplete => {
            for failure in report.failures() {
                eprintln!("required item failed: {}", failure.destination.display());
            }
            bail!("packaging incomplete: a required item failed to stage");
        }
    }
}
