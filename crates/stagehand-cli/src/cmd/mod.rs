//! CLI command implementations.

pub mod package;
pub mod platforms;
pub mod resolve;

use crate::ResolveArgs;
use anyhow::{Context, Result};
use stagehand_core::session::SessionRequest;
use stagehand_core::target::{load_override, load_target_descriptor};
use std::path::{Path, PathBuf};

/// A `*.target` descriptor at the top of the source tree, if there is
/// exactly one. The build system writes one next to each compiled program.
fn detect_target_file(source: &Path) -> Option<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(source).ok()?.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "target") && path.is_file() {
            found.push(path);
        }
    }
    match found.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    }
}

/// Build a [`SessionRequest`] from CLI arguments, loading the descriptor and
/// override files.
pub(crate) async fn build_request(
    args: &ResolveArgs,
    destination_root: PathBuf,
    workers: Option<usize>,
) -> Result<SessionRequest> {
    let target_file = args
        .target_file
        .clone()
        .or_else(|| detect_target_file(&args.source));
    let target = match target_file {
        Some(path) => Some(
            load_target_descriptor(&path)
                .await
                .with_context(|| format!("loading target descriptor {}", path.display()))?,
        ),
        None => None,
    };
    let overrides = match &args.override_file {
        Some(path) => Some(
            load_override(path)
                .await
                .with_context(|| format!("loading manifest override {}", path.display()))?,
        ),
        None => None,
    };

    Ok(SessionRequest {
        source_root: args.source.clone(),
        engine_root: args.engine.clone(),
        platform: args.platform.clone(),
        destination_root,
        target,
        overrides,
        workers,
    })
}

/// Default destination: `Package/` next to the source tree.
pub(crate) fn default_destination(source: &Path) -> PathBuf {
    source
        .parent()
        .unwrap_or(source)
        .join("Package")
}
