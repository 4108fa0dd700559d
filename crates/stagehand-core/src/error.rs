//! Domain-specific errors for packaging runs.

use std::path::PathBuf;
use thiserror::Error;

/// A problem found while resolving a manifest.
///
/// Conflicts are collected, not short-circuited: a failed resolution reports
/// every problem in one pass so a caller can fix them all before retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Two different sources map to the same destination path. Silently
    /// overwriting staged content is never acceptable.
    #[error("duplicate destination '{destination}': '{existing}' and '{incoming}'")]
    DuplicateDestination {
        /// The contested destination, relative to the package root.
        destination: PathBuf,
        /// Source already claiming the destination.
        existing: PathBuf,
        /// Source that tried to claim it second.
        incoming: PathBuf,
    },

    /// A pattern the policy marks mandatory matched zero files.
    #[error("missing required content: '{pattern}' matched nothing under '{root}'")]
    MissingRequiredContent {
        /// The required glob pattern.
        pattern: String,
        /// Root the pattern was searched under.
        root: PathBuf,
    },

    /// A target-descriptor path carried neither `$(EngineDir)/` nor
    /// `$(ProjectDir)/`, so no staging root can be chosen for it.
    #[error("unable to expand descriptor path '{path}'")]
    UnexpandablePath {
        /// The raw descriptor path.
        path: String,
    },
}

/// Errors that abort a run before any filesystem write.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The platform identifier is not in the supported set. Surfaced before
    /// resolution begins.
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    /// Resolution found conflicts; nothing was written.
    #[error("resolution failed with {} conflict(s)", .0.len())]
    Conflicts(Vec<Conflict>),

    /// A root directory or descriptor file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A descriptor or override file did not parse.
    #[error("invalid {kind} file '{path}': {message}")]
    InvalidInput {
        /// What kind of file failed to parse.
        kind: &'static str,
        /// The offending file.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },
}

impl ResolveError {
    /// The conflicts behind a [`ResolveError::Conflicts`], if any.
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            Self::Conflicts(c) => c,
            _ => &[],
        }
    }
}

/// Errors staging a single item. Recorded per item; never aborts the run.
#[derive(Error, Debug)]
pub enum StageError {
    /// Copying or stat-ing the item hit an I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The source vanished between resolution and staging.
    #[error("source not found: {0}")]
    SourceMissing(PathBuf),
}
