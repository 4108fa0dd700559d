//! Per-item staging outcomes and the final run report.

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of staging a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ItemResult {
    /// The item was staged.
    Succeeded,
    /// The item was deliberately not staged (already identical, or the run
    /// was cancelled before it started).
    Skipped {
        /// Why the item was skipped.
        reason: String,
    },
    /// Staging the item failed; the run continued past it.
    Failed {
        /// The error, rendered for the report.
        error: String,
    },
}

impl ItemResult {
    /// Whether this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One outcome per staged item, emitted as the run progresses and collected
/// into the final [`StagingReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingOutcome {
    /// Destination path of the item this outcome belongs to.
    pub destination: PathBuf,
    /// What happened.
    #[serde(flatten)]
    pub result: ItemResult,
    /// Whether the item was marked required by the manifest.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

/// Terminal state of a staging run.
///
/// `Cancelled` is distinct from `Incomplete`: cancellation is not a failure,
/// and consumers must be able to tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every item staged (or was skipped as already identical).
    Complete,
    /// At least one required item failed. Treated as a build failure.
    Incomplete,
    /// The run was cancelled cooperatively; staged items remain on disk.
    Cancelled,
}

/// The full record of one staging run, sorted by manifest order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingReport {
    /// Platform the run staged for.
    pub platform: Platform,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// One entry per manifest item, in manifest order.
    pub items: Vec<StagingOutcome>,
    /// Terminal state of the run.
    pub status: RunStatus,
}

impl StagingReport {
    /// Whether the run should be treated as a success by an orchestration
    /// caller (GUI ship confirmation, automation exit status).
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Complete
    }

    /// Outcomes that failed, in manifest order.
    pub fn failures(&self) -> impl Iterator<Item = &StagingOutcome> {
        self.items.iter().filter(|o| o.result.is_failure())
    }
}
