//! Manifest-override file support.
//!
//! Callers can supply a JSON file adding staged items or exclusion patterns
//! beyond the built-in platform policy. Two shapes are accepted: a bare
//! array of item objects, or an object with `items` and `exclusions` keys.

use crate::item::{ItemKind, StagedItem};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One caller-supplied item: `{source, destination, required, platforms}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideItem {
    /// Source path, absolute or relative to the source root.
    pub source: PathBuf,
    /// Destination path relative to the package root.
    pub destination: PathBuf,
    /// Whether the package is meaningless without this item.
    #[serde(default)]
    pub required: bool,
    /// Platforms the item applies to; empty means all.
    #[serde(default)]
    pub platforms: BTreeSet<Platform>,
}

impl From<OverrideItem> for StagedItem {
    fn from(o: OverrideItem) -> Self {
        StagedItem {
            source: o.source,
            destination: o.destination,
            kind: ItemKind::File,
            required: o.required,
            platforms: o.platforms,
        }
    }
}

/// Parsed manifest-override file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestOverride {
    /// Additional items to stage.
    #[serde(default)]
    pub items: Vec<OverrideItem>,
    /// Additional glob exclusion patterns applied to the source walk.
    #[serde(default)]
    pub exclusions: Vec<String>,
}

// The documented schema is a bare array of items; the object form exists so
// a caller can also add exclusions.
#[derive(Deserialize)]
#[serde(untagged)]
enum OverrideFile {
    Items(Vec<OverrideItem>),
    Full(ManifestOverride),
}

impl ManifestOverride {
    /// Parse an override file from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the text matches neither the bare
    /// array nor the object form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<OverrideFile>(text)? {
            OverrideFile::Items(items) => Ok(Self {
                items,
                exclusions: Vec::new(),
            }),
            OverrideFile::Full(full) => Ok(full),
        }
    }
}
