//! Packaging run orchestration.
//!
//! A session is one packaging run: policy lookup, resolution, staging,
//! progress, cancellation. It is the only surface a front-end talks to.
//! Sessions are created per run and discarded at run end; nothing persists
//! across runs.

use crate::error::{ResolveError, StageError};
use crate::policy::{PlatformPolicy, policy_for_id};
use crate::resolver::{ResolveRequest, resolve};
use crate::stager::{StageOptions, stage};
use stagehand_schema::{Manifest, ManifestOverride, StagingOutcome, StagingReport, TargetDescriptor};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything a caller provides to start a packaging run.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Root of the compiled program's output tree.
    pub source_root: PathBuf,
    /// Root of the engine installation.
    pub engine_root: PathBuf,
    /// Target platform identifier, e.g. `windows`, `ios`.
    pub platform: String,
    /// Where the package is staged.
    pub destination_root: PathBuf,
    /// Optional `.target` descriptor.
    pub target: Option<TargetDescriptor>,
    /// Optional manifest override.
    pub overrides: Option<ManifestOverride>,
    /// Worker pool size; defaults to the CPU count.
    pub workers: Option<usize>,
}

/// Errors terminating a session before or during orchestration. Per-item
/// staging problems are not errors; they live in the report.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Policy lookup or resolution failed; nothing was written.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The destination root could not be created.
    #[error(transparent)]
    Stage(#[from] StageError),
    /// The run task itself died.
    #[error("session task failed: {0}")]
    Internal(String),
}

/// Handle to a running session.
///
/// The progress stream is finite and not restartable: it ends when the run
/// completes or is cancelled, and can be taken exactly once.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedReceiver<StagingOutcome>>,
    task: JoinHandle<Result<StagingReport, SessionError>>,
}

impl SessionHandle {
    /// Request cooperative cancellation. Workers finish their current item;
    /// already-staged items remain on disk and the final report is flagged
    /// `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take the progress stream. Returns `None` on the second call.
    pub fn progress(&mut self) -> Option<UnboundedReceiverStream<StagingOutcome>> {
        self.progress.take().map(UnboundedReceiverStream::new)
    }

    /// Wait for the run to finish and return the final report.
    ///
    /// # Errors
    ///
    /// [`SessionError::Resolve`] when the run aborted before any write;
    /// per-item staging failures are reported in the `StagingReport`, not
    /// here.
    pub async fn wait(self) -> Result<StagingReport, SessionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Internal(e.to_string())),
        }
    }
}

/// Entry point for front-ends: start, cancel, and observe packaging runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionController;

impl SessionController {
    /// Resolve a manifest without staging anything, for dry runs and
    /// pre-staging confirmation.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`resolve`], plus
    /// [`ResolveError::UnknownPlatform`] for an unrecognized identifier.
    pub fn resolve_preview(req: &SessionRequest) -> Result<Manifest, ResolveError> {
        let policy = policy_for_id(&req.platform)?;
        Self::resolve_with(req, policy)
    }

    fn resolve_with(
        req: &SessionRequest,
        policy: &PlatformPolicy,
    ) -> Result<Manifest, ResolveError> {
        resolve(&ResolveRequest {
            source_root: &req.source_root,
            engine_root: &req.engine_root,
            policy,
            target: req.target.as_ref(),
            overrides: req.overrides.as_ref(),
        })
    }

    /// Start a packaging run. Policy lookup happens before the task spawns,
    /// so an unknown platform fails immediately; resolution and staging run
    /// on the returned handle's task.
    ///
    /// # Errors
    ///
    /// [`ResolveError::UnknownPlatform`] when the identifier is not
    /// supported.
    pub fn start(req: SessionRequest) -> Result<SessionHandle, ResolveError> {
        let policy = policy_for_id(&req.platform)?.clone();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            // Resolution walks the filesystem; keep it off the async workers.
            let manifest = {
                let req = req.clone();
                let policy = policy.clone();
                tokio::task::spawn_blocking(move || Self::resolve_with(&req, &policy))
                    .await
                    .map_err(|e| SessionError::Internal(e.to_string()))??
            };

            info!(
                platform = %manifest.platform,
                items = manifest.len(),
                dest = %req.destination_root.display(),
                "staging run starting"
            );

            let opts = StageOptions {
                workers: req.workers.unwrap_or_else(|| num_cpus::get().max(1)),
                cancel: task_cancel,
                progress: Some(tx),
            };
            let report = stage(&manifest, &req.destination_root, &policy, opts).await?;

            info!(status = ?report.status, "staging run finished");
            Ok(report)
        });

        Ok(SessionHandle {
            cancel,
            progress: Some(rx),
            task,
        })
    }
}
