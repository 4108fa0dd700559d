//! `stagehand resolve` - dry-run resolution, manifest printed as JSON.

use crate::ResolveArgs;
use crate::cmd::{build_request, default_destination};
use anyhow::{Context, Result};
use stagehand_core::SessionController;
use stagehand_core::error::ResolveError;

pub async fn resolve(args: ResolveArgs) -> Result<()> {
    let destination = default_destination(&args.source);
    let request = build_request(&args, destination, None).await?;

    match SessionController::resolve_preview(&request) {
        Ok(manifest) => {
            let json =
                serde_json::to_string_pretty(&manifest).context("serializing manifest")?;
            println!("{json}");
            Ok(())
        }
        Err(ResolveError::Conflicts(conflicts)) => {
            // Every conflict in one pass, so the caller fixes them together.
            for conflict in &conflicts {
                eprintln!("conflict: {conflict}");
            }
            anyhow::bail!("resolution failed with {} conflict(s)", conflicts.len());
        }
        Err(e) => Err(e.into()),
    }
}
