//! Shared types for the stagehand packaging engine.
//!
//! This crate holds the data model that flows between the resolver, the
//! stager, and any front-end: platforms, staged items, resolved manifests,
//! override files, target descriptors, and staging reports. Everything here
//! is plain data with serde derives; no I/O lives in this crate.

pub mod item;
pub mod overrides;
pub mod platform;
pub mod report;
pub mod target;

// Re-exports
pub use item::{ItemKind, Manifest, StagedItem};
pub use overrides::{ManifestOverride, OverrideItem};
pub use platform::Platform;
pub use report::{ItemResult, RunStatus, StagingOutcome, StagingReport};
pub use target::{BuildProduct, RuntimeDependency, TargetDescriptor};

/// File name of the served-content handoff written at the destination root
/// for platforms that stream content over a network file server.
pub const NETWORK_FILE_MANIFEST: &str = "NetworkFileManifest.json";
