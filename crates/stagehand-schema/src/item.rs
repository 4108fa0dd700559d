//! Staged items and the resolved manifest.
//!
//! A [`Manifest`] is the immutable output of resolution: the complete list
//! of items a staging run will act on, ordered so that directories precede
//! the files they contain. Re-resolving always produces a fresh `Manifest`;
//! nothing mutates one in place.

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// How a staged item moves (or doesn't move) bytes into the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Copy bytes from source to destination.
    File,
    /// Create the destination directory; no bytes copied.
    Directory,
    /// Record that the destination must resolve to the source at run time.
    /// Never copies bytes.
    SymbolicReference,
    /// Content served over a network file interface at run time instead of
    /// being cooked into the package. Never copies bytes.
    NetworkServed,
}

impl ItemKind {
    /// Whether this kind only records a source mapping instead of moving
    /// bytes during staging.
    pub fn is_served(&self) -> bool {
        matches!(self, Self::SymbolicReference | Self::NetworkServed)
    }
}

/// One entry in a resolved manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedItem {
    /// Absolute path of the source file or directory.
    pub source: PathBuf,
    /// Destination path, relative to the package root. Unique within a
    /// manifest; the resolver rejects duplicates.
    pub destination: PathBuf,
    /// How the item is staged.
    pub kind: ItemKind,
    /// A failed required item flags the whole report `Incomplete`.
    pub required: bool,
    /// Platforms the item applies to. Empty means all platforms.
    #[serde(default)]
    pub platforms: BTreeSet<Platform>,
}

impl StagedItem {
    /// A plain optional file copy, applicable to every platform.
    pub fn file(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind: ItemKind::File,
            required: false,
            platforms: BTreeSet::new(),
        }
    }

    /// Mark the item as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether this item ships on the given platform.
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    /// Depth of the destination path, used to order directory creation.
    pub fn depth(&self) -> usize {
        self.destination.components().count()
    }
}

/// The resolved, immutable list of items a staging run will act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Platform the manifest was resolved for.
    pub platform: Platform,
    /// When resolution completed.
    pub resolved_at: DateTime<Utc>,
    /// Items in staging order: directories by ascending depth, then files
    /// and served entries sorted by destination.
    pub items: Vec<StagedItem>,
}

impl Manifest {
    /// Number of items in the manifest.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by its destination path.
    pub fn find(&self, destination: &Path) -> Option<&StagedItem> {
        self.items.iter().find(|i| i.destination == destination)
    }
}
