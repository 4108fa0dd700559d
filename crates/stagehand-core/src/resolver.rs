//! Manifest resolution.
//!
//! Resolution walks the program's output tree and the engine installation,
//! applies the platform policy, and produces a concrete [`Manifest`]. It is
//! read-only against both roots and deterministic: the same inputs always
//! yield a structurally identical manifest, so a dry run is an exact preview
//! of what staging will do. All conflicts are collected in one pass; nothing
//! is written when resolution fails.

use crate::error::{Conflict, ResolveError};
use crate::policy::PlatformPolicy;
use chrono::Utc;
use glob::Pattern;
use stagehand_schema::target::{ExpandedPath, expand_path};
use stagehand_schema::{ItemKind, Manifest, ManifestOverride, StagedItem, TargetDescriptor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Inputs to one resolution pass.
#[derive(Debug)]
pub struct ResolveRequest<'a> {
    /// Root of the compiled program's output tree.
    pub source_root: &'a Path,
    /// Root of the engine installation.
    pub engine_root: &'a Path,
    /// Staging rules for the target platform.
    pub policy: &'a PlatformPolicy,
    /// Optional `.target` descriptor contributing build products and
    /// runtime dependencies.
    pub target: Option<&'a TargetDescriptor>,
    /// Optional caller-supplied extra items and exclusions.
    pub overrides: Option<&'a ManifestOverride>,
}

impl ResolveRequest<'_> {
    /// Target name used by layout templates: the descriptor's name when
    /// present, otherwise the source root's directory name.
    fn target_name(&self) -> String {
        if let Some(t) = self.target {
            return t.target_name.clone();
        }
        self.source_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Package".to_string())
    }
}

/// Compiled glob set matched against slash-separated relative paths.
struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    fn compile(raw: impl IntoIterator<Item = String>) -> Result<Self, ResolveError> {
        let patterns = raw
            .into_iter()
            .map(|p| {
                Pattern::new(&p).map_err(|e| ResolveError::InvalidInput {
                    kind: "glob pattern",
                    path: PathBuf::from(&p),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(rel))
    }
}

fn rel_str(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Deterministic sorted walk of every file under `root`. A missing or
/// unreadable root yields an empty list; whether that is an error depends on
/// what the policy required from it.
fn walk_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Accumulates items, rejecting duplicate destinations with different
/// sources. The same (source, destination) pair seen twice is deduplicated
/// silently.
struct ItemCollector {
    items: Vec<StagedItem>,
    by_destination: HashMap<PathBuf, usize>,
    conflicts: Vec<Conflict>,
}

impl ItemCollector {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            by_destination: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    fn push(&mut self, item: StagedItem) {
        if let Some(&idx) = self.by_destination.get(&item.destination) {
            let existing = &mut self.items[idx];
            if existing.source == item.source {
                // A required claim wins over an optional duplicate.
                existing.required |= item.required;
            } else {
                self.conflicts.push(Conflict::DuplicateDestination {
                    destination: item.destination.clone(),
                    existing: existing.source.clone(),
                    incoming: item.source,
                });
            }
            return;
        }
        self.by_destination
            .insert(item.destination.clone(), self.items.len());
        self.items.push(item);
    }
}

/// Resolve a manifest for one packaging run.
///
/// Performs no filesystem writes. Fails with [`ResolveError::Conflicts`]
/// carrying every duplicate destination, missing required pattern, and
/// unexpandable descriptor path found, so a caller fixes all problems before
/// retrying instead of iterating one failure at a time.
///
/// # Errors
///
/// [`ResolveError::Conflicts`] for semantic problems, or
/// [`ResolveError::InvalidInput`] when a policy or override glob pattern
/// fails to compile.
pub fn resolve(req: &ResolveRequest<'_>) -> Result<Manifest, ResolveError> {
    let policy = req.policy;
    let target_name = req.target_name();

    let mut exclusion_raw: Vec<String> = policy.exclusions.clone();
    if let Some(ov) = req.overrides {
        exclusion_raw.extend(ov.exclusions.iter().cloned());
    }
    let exclusions = PatternSet::compile(exclusion_raw)?;
    let served = PatternSet::compile(policy.network_served.clone())?;
    let required_plugins = PatternSet::compile(policy.required_plugins.clone())?;
    let required_source: Vec<Pattern> = PatternSet::compile(policy.required_source.clone())?.patterns;
    let required_engine: Vec<Pattern> =
        PatternSet::compile(policy.required_engine_content.clone())?.patterns;

    let mut collector = ItemCollector::new();

    // 1. Program output tree.
    let source_files = walk_files(req.source_root);
    let mut source_matched = vec![false; required_source.len()];
    for rel in &source_files {
        let rel_s = rel_str(rel);
        if exclusions.matches(&rel_s) {
            debug!(path = %rel_s, "excluded by policy");
            continue;
        }
        let mut required = required_plugins.matches(&rel_s);
        for (i, pat) in required_source.iter().enumerate() {
            if pat.matches(&rel_s) {
                source_matched[i] = true;
                required = true;
            }
        }
        let kind = if policy.requires_network_file_server && served.matches(&rel_s) {
            ItemKind::NetworkServed
        } else {
            ItemKind::File
        };
        collector.push(StagedItem {
            source: req.source_root.join(rel),
            destination: policy.layout.source_dest(&target_name, rel),
            kind,
            required,
            platforms: Default::default(),
        });
    }
    for (i, pat) in required_source.iter().enumerate() {
        if !source_matched[i] {
            collector.conflicts.push(Conflict::MissingRequiredContent {
                pattern: pat.as_str().to_string(),
                root: req.source_root.to_path_buf(),
            });
        }
    }

    // 2. Required engine content. On network-file-server platforms this is
    // referenced, not copied: the content may not be cooked yet.
    if !required_engine.is_empty() {
        let engine_files = walk_files(req.engine_root);
        for pat in &required_engine {
            let mut matched = false;
            for rel in &engine_files {
                let rel_s = rel_str(rel);
                if !pat.matches(&rel_s) || exclusions.matches(&rel_s) {
                    continue;
                }
                matched = true;
                let kind = if policy.requires_network_file_server {
                    ItemKind::NetworkServed
                } else {
                    ItemKind::File
                };
                collector.push(StagedItem {
                    source: req.engine_root.join(rel),
                    destination: policy.layout.engine_dest(&target_name, rel),
                    kind,
                    required: true,
                    platforms: Default::default(),
                });
            }
            if !matched {
                collector.conflicts.push(Conflict::MissingRequiredContent {
                    pattern: pat.as_str().to_string(),
                    root: req.engine_root.to_path_buf(),
                });
            }
        }
    }

    // 3. Target descriptor build products and runtime dependencies.
    if let Some(descriptor) = req.target {
        for raw in descriptor.deployment_paths(policy.stage_debug_symbols) {
            if Path::new(&raw).extension().is_some_and(|e| e == "uproject") {
                continue;
            }
            match expand_path(&raw) {
                Some(ExpandedPath::Engine(rel)) => {
                    let rel = PathBuf::from(rel);
                    collector.push(StagedItem {
                        source: req.engine_root.join(&rel),
                        destination: policy.layout.engine_dest(&target_name, &rel),
                        kind: ItemKind::File,
                        required: true,
                        platforms: Default::default(),
                    });
                }
                Some(ExpandedPath::Project(rel)) => {
                    let rel = PathBuf::from(rel);
                    collector.push(StagedItem {
                        source: req.source_root.join(&rel),
                        destination: policy.layout.project_dest(&target_name, &rel),
                        kind: ItemKind::File,
                        required: true,
                        platforms: Default::default(),
                    });
                }
                None => {
                    collector
                        .conflicts
                        .push(Conflict::UnexpandablePath { path: raw });
                }
            }
        }
    }

    // 4. Caller-supplied override items.
    if let Some(ov) = req.overrides {
        for item in &ov.items {
            let mut staged: StagedItem = item.clone().into();
            if !staged.applies_to(policy.platform) {
                continue;
            }
            if staged.source.is_relative() {
                staged.source = req.source_root.join(&staged.source);
            }
            if staged.source.is_dir() {
                staged.kind = ItemKind::Directory;
            }
            collector.push(staged);
        }
    }

    if !collector.conflicts.is_empty() {
        return Err(ResolveError::Conflicts(collector.conflicts));
    }

    // 5. Directories before the files they contain, shallow first; files
    // and served entries in destination order.
    let mut items = collector.items;
    items.sort_by(|a, b| {
        let a_dir = a.kind == ItemKind::Directory;
        let b_dir = b.kind == ItemKind::Directory;
        b_dir
            .cmp(&a_dir)
            .then_with(|| {
                if a_dir && b_dir {
                    a.depth().cmp(&b.depth())
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .then_with(|| a.destination.cmp(&b.destination))
    });

    debug!(
        platform = %policy.platform,
        items = items.len(),
        "manifest resolved"
    );

    Ok(Manifest {
        platform: policy.platform,
        resolved_at: Utc::now(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{LayoutRules, policy_for};
    use stagehand_schema::Platform;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn windows_policy_requiring_shaders() -> PlatformPolicy {
        let mut policy = policy_for(Platform::Windows).clone();
        policy.required_engine_content = vec!["engine/content/shaders.bin".to_string()];
        policy
    }

    #[test]
    fn resolves_windows_scenario() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");
        write(source.path(), "data/level1.pak", "pak");
        write(source.path(), "game.pdb", "symbols");
        write(engine.path(), "engine/content/shaders.bin", "shaders");

        let policy = windows_policy_requiring_shaders();
        let manifest = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: None,
        })
        .unwrap();

        let dests: Vec<_> = manifest
            .items
            .iter()
            .map(|i| i.destination.clone())
            .collect();
        assert_eq!(
            dests,
            vec![
                PathBuf::from("data/level1.pak"),
                PathBuf::from("engine/content/shaders.bin"),
                PathBuf::from("game.bin"),
            ]
        );
        assert!(manifest.find(Path::new("engine/content/shaders.bin")).unwrap().required);
        assert!(manifest.items.iter().all(|i| i.kind == ItemKind::File));
    }

    #[test]
    fn missing_required_engine_content_names_the_pattern() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");

        let policy = windows_policy_requiring_shaders();
        let err = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: None,
        })
        .unwrap_err();

        let conflicts = err.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            &conflicts[0],
            Conflict::MissingRequiredContent { pattern, .. }
                if pattern.contains("shaders.bin")
        ));
    }

    #[test]
    fn ios_pak_content_is_network_served() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");
        write(source.path(), "data/level1.pak", "pak");

        let mut policy = policy_for(Platform::Ios).clone();
        // Keep destinations flat so the assertion reads like the inputs.
        policy.layout = LayoutRules::staged_directory();
        policy.network_served = vec!["data/*.pak".to_string()];

        let manifest = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: None,
        })
        .unwrap();

        let pak = manifest.find(Path::new("data/level1.pak")).unwrap();
        assert_eq!(pak.kind, ItemKind::NetworkServed);
        let bin = manifest.find(Path::new("game.bin")).unwrap();
        assert_eq!(bin.kind, ItemKind::File);
    }

    #[test]
    fn resolution_is_deterministic() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        for name in ["z.bin", "a.bin", "m/n.dat", "b/c.dat"] {
            write(source.path(), name, name);
        }
        let policy = policy_for(Platform::Linux).clone();
        let req = ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: None,
        };
        let first = resolve(&req).unwrap();
        let second = resolve(&req).unwrap();
        assert_eq!(first.items, second.items);
    }

    #[test]
    fn duplicate_destinations_conflict() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");
        write(source.path(), "extra/game.bin", "other");

        let policy = policy_for(Platform::Windows).clone();
        let ov = ManifestOverride::from_json(
            r#"[{"source": "extra/game.bin", "destination": "game.bin"}]"#,
        )
        .unwrap();
        let err = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: Some(&ov),
        })
        .unwrap_err();
        assert!(matches!(
            err.conflicts()[0],
            Conflict::DuplicateDestination { .. }
        ));
    }

    #[test]
    fn override_exclusions_apply_to_the_walk() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");
        write(source.path(), "notes.txt", "scratch");

        let policy = policy_for(Platform::Windows).clone();
        let ov = ManifestOverride::from_json(r#"{"exclusions": ["*.txt"]}"#).unwrap();
        let manifest = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: Some(&ov),
        })
        .unwrap();
        assert!(manifest.find(Path::new("notes.txt")).is_none());
        assert!(manifest.find(Path::new("game.bin")).is_some());
    }

    #[test]
    fn descriptor_paths_expand_into_both_trees() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "Binaries/Linux/MyGame", "elf");
        write(engine.path(), "Content/Shaders/s.bin", "glsl");

        let descriptor = TargetDescriptor::from_json(
            r#"{
                "TargetName": "MyGame",
                "BuildProducts": [
                    {"Path": "$(ProjectDir)/Binaries/Linux/MyGame", "Type": "Executable"},
                    {"Path": "$(ProjectDir)/Binaries/Linux/MyGame.sym", "Type": "SymbolFile"}
                ],
                "RuntimeDependencies": [
                    {"Path": "$(EngineDir)/Content/Shaders/s.bin", "Type": "NonUFS"}
                ]
            }"#,
        )
        .unwrap();

        let policy = policy_for(Platform::Linux).clone();
        let manifest = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: Some(&descriptor),
            overrides: None,
        })
        .unwrap();

        // Symbol file filtered; executable lands under the target name,
        // engine dependency keeps its engine-relative path.
        let exe = manifest
            .find(Path::new("MyGame/Binaries/Linux/MyGame"))
            .unwrap();
        assert!(exe.required);
        assert!(manifest.find(Path::new("Content/Shaders/s.bin")).is_some());
        assert!(
            manifest
                .items
                .iter()
                .all(|i| !i.destination.to_string_lossy().contains(".sym"))
        );
    }

    #[test]
    fn unexpandable_descriptor_path_is_a_conflict() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        let descriptor = TargetDescriptor::from_json(
            r#"{
                "TargetName": "MyGame",
                "BuildProducts": [{"Path": "C:/somewhere/else.dll", "Type": "DynamicLibrary"}]
            }"#,
        )
        .unwrap();
        let policy = policy_for(Platform::Windows).clone();
        let err = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: Some(&descriptor),
            overrides: None,
        })
        .unwrap_err();
        assert!(matches!(
            err.conflicts()[0],
            Conflict::UnexpandablePath { .. }
        ));
    }

    #[test]
    fn directory_overrides_sort_before_files() {
        let source = TempDir::new().unwrap();
        let engine = TempDir::new().unwrap();
        write(source.path(), "game.bin", "binary");
        fs::create_dir_all(source.path().join("logs")).unwrap();

        let policy = policy_for(Platform::Linux).clone();
        let ov = ManifestOverride::from_json(
            r#"[{"source": "logs", "destination": "var/logs"}]"#,
        )
        .unwrap();
        let manifest = resolve(&ResolveRequest {
            source_root: source.path(),
            engine_root: engine.path(),
            policy: &policy,
            target: None,
            overrides: Some(&ov),
        })
        .unwrap();
        assert_eq!(manifest.items[0].kind, ItemKind::Directory);
        assert_eq!(manifest.items[0].destination, PathBuf::from("var/logs"));
    }
}
