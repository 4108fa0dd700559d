//! Loading target descriptors and manifest overrides from disk.

use crate::error::ResolveError;
use stagehand_schema::{ManifestOverride, TargetDescriptor};
use std::path::Path;
use tokio::fs;

/// Load and parse a `<Target>.target` descriptor.
///
/// # Errors
///
/// [`ResolveError::Io`] if the file cannot be read,
/// [`ResolveError::InvalidInput`] if it is not a valid descriptor.
pub async fn load_target_descriptor(path: &Path) -> Result<TargetDescriptor, ResolveError> {
    let text = fs::read_to_string(path).await?;
    TargetDescriptor::from_json(&text).map_err(|e| ResolveError::InvalidInput {
        kind: "target descriptor",
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and parse a manifest-override file.
///
/// # Errors
///
/// [`ResolveError::Io`] if the file cannot be read,
/// [`ResolveError::InvalidInput`] if it matches neither accepted shape.
pub async fn load_override(path: &Path) -> Result<ManifestOverride, ResolveError> {
    let text = fs::read_to_string(path).await?;
    ManifestOverride::from_json(&text).map_err(|e| ResolveError::InvalidInput {
        kind: "manifest override",
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn loads_descriptor_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"TargetName": "MyGame", "BuildProducts": [], "RuntimeDependencies": []}}"#
        )
        .unwrap();
        let descriptor = load_target_descriptor(file.path()).await.unwrap();
        assert_eq!(descriptor.target_name, "MyGame");
    }

    #[tokio::test]
    async fn invalid_descriptor_reports_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = load_target_descriptor(file.path()).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidInput { kind: "target descriptor", .. }
        ));
    }
}
