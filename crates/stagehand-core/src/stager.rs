//! Manifest staging.
//!
//! The stager executes a resolved manifest against a destination root:
//! directories are created first, then file items are copied by a bounded
//! pool of workers. Staging is partial-failure tolerant by item: one copy
//! failing never stops the others, so a failed run still reports every
//! problem in one pass. Copies go through a temp file in the destination
//! directory and are renamed into place, so cancellation or a crash never
//! leaves a torn file behind a `Succeeded` outcome.
//!
//! Re-running the same manifest against the same destination is idempotent;
//! byte-identical files are detected by size plus SHA-256 and skipped.

use crate::error::StageError;
use crate::policy::PlatformPolicy;
use chrono::Utc;
use futures::{StreamExt, stream};
use glob::Pattern;
use sha2::{Digest, Sha256};
use stagehand_schema::{
    ItemKind, Manifest, NETWORK_FILE_MANIFEST, ItemResult, RunStatus, StagedItem, StagingOutcome,
    StagingReport,
};
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Knobs for one staging run.
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Maximum number of items staged concurrently.
    pub workers: usize,
    /// Cooperative cancellation flag, checked between items, never mid-copy.
    pub cancel: CancellationToken,
    /// Optional channel receiving each outcome as it happens.
    pub progress: Option<mpsc::UnboundedSender<StagingOutcome>>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

/// SHA-256 of a file's contents, streamed in 64 KiB chunks.
fn file_digest(path: &Path) -> std::io::Result<[u8; 32]> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Whether destination already holds exactly the source bytes. Sizes are
/// compared first; hashing only runs on a size match.
fn already_identical(source: &Path, dest: &Path) -> bool {
    let (Ok(src_meta), Ok(dst_meta)) = (std::fs::metadata(source), std::fs::metadata(dest)) else {
        return false;
    };
    if !dst_meta.is_file() || src_meta.len() != dst_meta.len() {
        return false;
    }
    match (file_digest(source), file_digest(dest)) {
        (Ok(a), Ok(b)) => {
            if a == b {
                debug!(dest = %dest.display(), digest = %hex::encode(a), "destination already identical");
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

/// Copy `source` to `dest` atomically: bytes land in a temp file in the
/// destination directory and are renamed into place. The parent directory is
/// (re)created first, which doubles as the lazy retry for a directory item
/// that failed earlier.
fn copy_atomic(source: &Path, dest: &Path, executable: bool) -> Result<(), StageError> {
    if !source.exists() {
        return Err(StageError::SourceMissing(source.to_path_buf()));
    }
    let parent = dest.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::fs::copy(source, tmp.path())?;
    if executable {
        set_executable(tmp.path())?;
    }
    tmp.persist(dest).map_err(|e| StageError::Io(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn stage_file_blocking(
    source: &Path,
    dest: &Path,
    executable: bool,
) -> Result<ItemResult, StageError> {
    if already_identical(source, dest) {
        return Ok(ItemResult::Skipped {
            reason: "identical".to_string(),
        });
    }
    copy_atomic(source, dest, executable)?;
    Ok(ItemResult::Succeeded)
}

/// Served-content table shared by the workers handling NetworkServed and
/// SymbolicReference items. Each destination is written at most once (the
/// resolver rejects duplicate destinations), so the mutex only guards the
/// map structure itself.
type ServedTable = Arc<Mutex<BTreeMap<PathBuf, PathBuf>>>;

async fn stage_one(
    item: StagedItem,
    destination_root: PathBuf,
    executable: bool,
    served: ServedTable,
) -> StagingOutcome {
    let result = match item.kind {
        ItemKind::Directory => {
            match tokio::fs::create_dir_all(destination_root.join(&item.destination)).await {
                Ok(()) => ItemResult::Succeeded,
                Err(e) => ItemResult::Failed {
                    error: e.to_string(),
                },
            }
        }
        ItemKind::File => {
            let source = item.source.clone();
            let dest = destination_root.join(&item.destination);
            let staged =
                tokio::task::spawn_blocking(move || stage_file_blocking(&source, &dest, executable))
                    .await;
            match staged {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => ItemResult::Failed {
                    error: e.to_string(),
                },
                Err(join) => ItemResult::Failed {
                    error: format!("staging task panicked: {join}"),
                },
            }
        }
        ItemKind::SymbolicReference | ItemKind::NetworkServed => {
            // No bytes move; fail only if the source is unreachable.
            match tokio::fs::metadata(&item.source).await {
                Ok(_) => {
                    let mut table = served.lock().unwrap_or_else(|e| e.into_inner());
                    table.insert(item.destination.clone(), item.source.clone());
                    ItemResult::Succeeded
                }
                Err(_) => ItemResult::Failed {
                    error: StageError::SourceMissing(item.source.clone()).to_string(),
                },
            }
        }
    };

    StagingOutcome {
        destination: item.destination,
        result,
        required: item.required,
    }
}

/// Execute a resolved manifest against `destination_root`.
///
/// Directory items run first in manifest order; everything else is staged by
/// up to `opts.workers` concurrent workers. The returned report is sorted by
/// manifest order regardless of completion order. A required item failing
/// flags the report `Incomplete`; cooperative cancellation flags it
/// `Cancelled` and records unstarted items as skipped.
///
/// # Errors
///
/// Only creating the destination root itself can fail the call; every
/// per-item problem is recorded in the report instead.
pub async fn stage(
    manifest: &Manifest,
    destination_root: &Path,
    policy: &PlatformPolicy,
    opts: StageOptions,
) -> Result<StagingReport, StageError> {
    tokio::fs::create_dir_all(destination_root).await?;

    let exec_patterns: Vec<Pattern> = policy
        .requires_executable_bit
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();
    let needs_exec = |dest: &Path| -> bool {
        let rel = dest
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        exec_patterns.iter().any(|p| p.matches(&rel))
    };

    let served: ServedTable = Arc::new(Mutex::new(BTreeMap::new()));
    let mut outcomes: Vec<StagingOutcome> = Vec::with_capacity(manifest.len());

    let emit = |outcome: &StagingOutcome| {
        if let Some(tx) = &opts.progress {
            // A dropped subscriber must not stall the run.
            let _ = tx.send(outcome.clone());
        }
    };

    // Directories first, in manifest order (shallowest first). A directory
    // failure is not fatal: files retry creation of their parents lazily.
    let (dirs, files): (Vec<_>, Vec<_>) = manifest
        .items
        .iter()
        .cloned()
        .partition(|i| i.kind == ItemKind::Directory);

    for item in dirs {
        let outcome = if opts.cancel.is_cancelled() {
            StagingOutcome {
                destination: item.destination,
                result: ItemResult::Skipped {
                    reason: "cancelled".to_string(),
                },
                required: item.required,
            }
        } else {
            stage_one(item, destination_root.to_path_buf(), false, served.clone()).await
        };
        emit(&outcome);
        outcomes.push(outcome);
    }

    // Independent items fan out to the worker pool. Workers finish their
    // current item before observing cancellation.
    let mut pool = stream::iter(files.into_iter().map(|item| {
        let cancel = opts.cancel.clone();
        let served = served.clone();
        let root = destination_root.to_path_buf();
        let executable = item.kind == ItemKind::File && needs_exec(&item.destination);
        async move {
            if cancel.is_cancelled() {
                return StagingOutcome {
                    destination: item.destination,
                    result: ItemResult::Skipped {
                        reason: "cancelled".to_string(),
                    },
                    required: item.required,
                };
            }
            stage_one(item, root, executable, served).await
        }
    }))
    .buffer_unordered(opts.workers.max(1));

    while let Some(outcome) = pool.next().await {
        emit(&outcome);
        outcomes.push(outcome);
    }
    drop(pool);

    // Hand the served-content table to the runtime's network file server.
    let served = served.lock().unwrap_or_else(|e| e.into_inner()).clone();
    if !served.is_empty() && !opts.cancel.is_cancelled() {
        let path = destination_root.join(NETWORK_FILE_MANIFEST);
        let table: BTreeMap<String, String> = served
            .iter()
            .map(|(d, s)| (d.display().to_string(), s.display().to_string()))
            .collect();
        match serde_json::to_vec_pretty(&table) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(path = %path.display(), error = %e, "failed to write served-content table");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize served-content table"),
        }
    }

    // Consumers never see arrival order: sort outcomes by manifest order.
    let order: HashMap<&Path, usize> = manifest
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.destination.as_path(), i))
        .collect();
    outcomes.sort_by_key(|o| order.get(o.destination.as_path()).copied().unwrap_or(usize::MAX));

    let status = if opts.cancel.is_cancelled() {
        RunStatus::Cancelled
    } else if outcomes
        .iter()
        .any(|o| o.required && o.result.is_failure())
    {
        RunStatus::Incomplete
    } else {
        RunStatus::Complete
    };

    Ok(StagingReport {
        platform: manifest.platform,
        timestamp: Utc::now(),
        items: outcomes,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::policy_for;
    use stagehand_schema::Platform;
    use std::fs;
    use tempfile::TempDir;

    fn manifest_of(platform: Platform, items: Vec<StagedItem>) -> Manifest {
        Manifest {
            platform,
            resolved_at: Utc::now(),
            items,
        }
    }

    fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn stages_files_and_reports_complete() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "binary");
        let pak = write(src.path(), "data/level1.pak", "pak");

        let manifest = manifest_of(
            Platform::Windows,
            vec![
                StagedItem::file(game, "game.bin"),
                StagedItem::file(pak, "data/level1.pak"),
            ],
        );
        let policy = policy_for(Platform::Windows);
        let report = stage(&manifest, dst.path(), policy, StageOptions::default())
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Complete);
        assert_eq!(report.items.len(), 2);
        assert_eq!(
            fs::read_to_string(dst.path().join("data/level1.pak")).unwrap(),
            "pak"
        );
    }

    #[tokio::test]
    async fn second_run_skips_identical_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "binary");
        let manifest = manifest_of(Platform::Linux, vec![StagedItem::file(game, "game.bin")]);
        let policy = policy_for(Platform::Linux);

        let first = stage(&manifest, dst.path(), policy, StageOptions::default())
            .await
            .unwrap();
        assert_eq!(first.items[0].result, ItemResult::Succeeded);

        let second = stage(&manifest, dst.path(), policy, StageOptions::default())
            .await
            .unwrap();
        assert_eq!(second.status, RunStatus::Complete);
        assert!(matches!(
            second.items[0].result,
            ItemResult::Skipped { ref reason } if reason == "identical"
        ));
        assert_eq!(
            fs::read_to_string(dst.path().join("game.bin")).unwrap(),
            "binary"
        );
    }

    #[tokio::test]
    async fn stale_destination_is_overwritten() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "fresh bytes");
        write(dst.path(), "game.bin", "stale");

        let manifest = manifest_of(Platform::Linux, vec![StagedItem::file(game, "game.bin")]);
        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Linux),
            StageOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.items[0].result, ItemResult::Succeeded);
        assert_eq!(
            fs::read_to_string(dst.path().join("game.bin")).unwrap(),
            "fresh bytes"
        );
    }

    #[tokio::test]
    async fn optional_failure_does_not_disturb_other_items() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "binary");
        let missing = src.path().join("gone.dat");

        let manifest = manifest_of(
            Platform::Windows,
            vec![
                StagedItem::file(missing, "gone.dat"),
                StagedItem::file(game, "game.bin"),
            ],
        );
        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Windows),
            StageOptions::default(),
        )
        .await
        .unwrap();

        // Report is in manifest order, run continued past the failure, and
        // an optional failure does not flag the run incomplete.
        assert!(report.items[0].result.is_failure());
        assert_eq!(report.items[1].result, ItemResult::Succeeded);
        assert_eq!(report.status, RunStatus::Complete);
        assert!(dst.path().join("game.bin").exists());
    }

    #[tokio::test]
    async fn required_failure_escalates_to_incomplete() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "binary");
        let missing = src.path().join("shaders.bin");

        let manifest = manifest_of(
            Platform::Windows,
            vec![
                StagedItem::file(missing, "engine/content/shaders.bin").required(),
                StagedItem::file(game, "game.bin"),
            ],
        );
        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Windows),
            StageOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(report.status, RunStatus::Incomplete);
        // The rest of the run still completed.
        assert_eq!(report.items[1].result, ItemResult::Succeeded);
    }

    #[tokio::test]
    async fn cancelled_before_start_skips_everything() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let game = write(src.path(), "game.bin", "binary");

        let manifest = manifest_of(Platform::Mac, vec![StagedItem::file(game, "game.bin")]);
        let opts = StageOptions::default();
        opts.cancel.cancel();

        let report = stage(&manifest, dst.path(), policy_for(Platform::Mac), opts)
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(matches!(
            report.items[0].result,
            ItemResult::Skipped { ref reason } if reason == "cancelled"
        ));
        assert!(!dst.path().join("game.bin").exists());
    }

    #[tokio::test]
    async fn network_served_items_move_no_bytes() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let pak = write(src.path(), "data/level1.pak", "pak");

        let mut item = StagedItem::file(pak.clone(), "data/level1.pak");
        item.kind = ItemKind::NetworkServed;
        let manifest = manifest_of(Platform::Ios, vec![item]);

        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Ios),
            StageOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.status, RunStatus::Complete);
        assert!(!dst.path().join("data/level1.pak").exists());

        let table: BTreeMap<String, String> = serde_json::from_slice(
            &fs::read(dst.path().join(NETWORK_FILE_MANIFEST)).unwrap(),
        )
        .unwrap();
        assert_eq!(table["data/level1.pak"], pak.display().to_string());
    }

    #[tokio::test]
    async fn served_item_with_missing_source_fails() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let mut item = StagedItem::file(src.path().join("absent.pak"), "absent.pak");
        item.kind = ItemKind::SymbolicReference;
        let manifest = manifest_of(Platform::Tvos, vec![item]);

        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Tvos),
            StageOptions::default(),
        )
        .await
        .unwrap();
        assert!(report.items[0].result.is_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn executable_bit_applied_by_policy_pattern() {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let script = write(src.path(), "launch.sh", "#!/bin/sh\n");

        let manifest = manifest_of(Platform::Linux, vec![StagedItem::file(script, "launch.sh")]);
        let report = stage(
            &manifest,
            dst.path(),
            policy_for(Platform::Linux),
            StageOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(report.items[0].result, ItemResult::Succeeded);

        let mode = fs::metadata(dst.path().join("launch.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
