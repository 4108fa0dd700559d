//! Platform staging policies.
//!
//! Every per-platform difference the engine knows about lives here as data:
//! destination layout templates, exclusion filters, required content,
//! network-served patterns, and executable-bit rules. The resolver and
//! stager stay single-pathed and dispatch on these records instead of
//! branching on platform identifiers.

use crate::error::ResolveError;
use stagehand_schema::Platform;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Destination path templates. `{target}` expands to the target name,
/// `{path}` to the item's root-relative path.
#[derive(Debug, Clone)]
pub struct LayoutRules {
    /// Template for files enumerated under the source root.
    pub source: String,
    /// Template for engine content, keyed by its engine-root-relative path.
    pub engine: String,
    /// Template for `$(ProjectDir)` descriptor entries.
    pub project: String,
}

impl LayoutRules {
    /// Flat staged-directory layout used by the desktop platforms.
    pub fn staged_directory() -> Self {
        Self {
            source: "{path}".to_string(),
            engine: "{path}".to_string(),
            project: "{target}/{path}".to_string(),
        }
    }

    /// iOS/tvOS app bundle layout.
    pub fn app_bundle() -> Self {
        Self {
            source: "Payload/{target}.app/{path}".to_string(),
            engine: "Payload/{target}.app/Engine/{path}".to_string(),
            project: "Payload/{target}.app/{path}".to_string(),
        }
    }

    fn apply(template: &str, target: &str, rel: &Path) -> PathBuf {
        // Render relative paths with forward slashes so templates behave the
        // same on every host.
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        PathBuf::from(template.replace("{target}", target).replace("{path}", &rel))
    }

    /// Destination for a file found under the source root.
    pub fn source_dest(&self, target: &str, rel: &Path) -> PathBuf {
        Self::apply(&self.source, target, rel)
    }

    /// Destination for engine content.
    pub fn engine_dest(&self, target: &str, rel: &Path) -> PathBuf {
        Self::apply(&self.engine, target, rel)
    }

    /// Destination for a project-tree descriptor entry.
    pub fn project_dest(&self, target: &str, rel: &Path) -> PathBuf {
        Self::apply(&self.project, target, rel)
    }
}

/// The staging rule set for one platform. Read-only after load; one record
/// per supported platform, looked up by identifier.
#[derive(Debug, Clone)]
pub struct PlatformPolicy {
    /// Platform this policy applies to.
    pub platform: Platform,
    /// Destination layout templates.
    pub layout: LayoutRules,
    /// Glob patterns (over root-relative paths) excluded from staging:
    /// build intermediates, debug symbols, editor droppings.
    pub exclusions: Vec<String>,
    /// Source-tree patterns that must match at least one file.
    pub required_source: Vec<String>,
    /// Engine-content patterns (relative to the engine root) that must ship.
    pub required_engine_content: Vec<String>,
    /// Patterns whose matches are served over the network file interface
    /// instead of copied, when [`requires_network_file_server`] is set.
    ///
    /// [`requires_network_file_server`]: Self::requires_network_file_server
    pub network_served: Vec<String>,
    /// Whether non-cooked content on this platform is served at run time by
    /// a network file server rather than staged as bytes.
    pub requires_network_file_server: bool,
    /// Destination patterns that get the executable permission after copy.
    pub requires_executable_bit: Vec<String>,
    /// Whether debug symbol build products ship with the package.
    pub stage_debug_symbols: bool,
    /// Plugin descriptor patterns that are mandatory on this platform.
    /// Anything else matched by the general walk stays optional.
    pub required_plugins: Vec<String>,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| (*s).to_string()).collect()
}

// Exclusions shared by every platform: build intermediates and editor state
// never ship. Patterns match slash-separated relative paths with `*`
// spanning separators, so `*.obj` also catches nested objects.
const COMMON_EXCLUSIONS: &[&str] = &["Intermediate/*", "Saved/*", "*.tmp", "*.obj", "*.o"];

fn common_policy(platform: Platform, layout: LayoutRules) -> PlatformPolicy {
    PlatformPolicy {
        platform,
        layout,
        exclusions: strings(COMMON_EXCLUSIONS),
        required_source: Vec::new(),
        required_engine_content: Vec::new(),
        network_served: Vec::new(),
        requires_network_file_server: platform.uses_network_file_server(),
        requires_executable_bit: Vec::new(),
        stage_debug_symbols: false,
        required_plugins: strings(&["Plugins/*.uplugin"]),
    }
}

fn builtin_policies() -> HashMap<Platform, PlatformPolicy> {
    let mut map = HashMap::new();

    let mut windows = common_policy(Platform::Windows, LayoutRules::staged_directory());
    windows
        .exclusions
        .extend(strings(&["*.pdb", "*.ilk", "*.exp"]));
    map.insert(Platform::Windows, windows);

    let mut mac = common_policy(Platform::Mac, LayoutRules::staged_directory());
    mac.exclusions
        .extend(strings(&["*.dSYM", "*.dSYM/*", "*.DS_Store"]));
    mac.requires_executable_bit = strings(&["*.sh", "*.command"]);
    map.insert(Platform::Mac, mac);

    // Linux stages a flat directory consumed by the common startup shim; the
    // shim expects launch scripts to be executable.
    let mut linux = common_policy(Platform::Linux, LayoutRules::staged_directory());
    linux
        .exclusions
        .extend(strings(&["*.debug", "*.sym"]));
    linux.requires_executable_bit = strings(&["*.sh"]);
    map.insert(Platform::Linux, linux);

    for platform in [Platform::Ios, Platform::Tvos] {
        let mut mobile = common_policy(platform, LayoutRules::app_bundle());
        mobile
            .exclusions
            .extend(strings(&["*.dSYM", "*.dSYM/*"]));
        // Cooked content may not exist yet at package time; pak data is
        // resolved at run time by the network file server.
        mobile.network_served = strings(&["*.pak", "Content/*"]);
        map.insert(platform, mobile);
    }

    map
}

static POLICIES: OnceLock<HashMap<Platform, PlatformPolicy>> = OnceLock::new();

/// Look up the built-in policy for a platform.
pub fn policy_for(platform: Platform) -> &'static PlatformPolicy {
    let policies = POLICIES.get_or_init(builtin_policies);
    policies
        .get(&platform)
        .unwrap_or_else(|| unreachable!("policy registered for every Platform variant"))
}

/// Look up a policy by its string identifier.
///
/// # Errors
///
/// Returns [`ResolveError::UnknownPlatform`] when the identifier is not in
/// the supported set.
pub fn policy_for_id(id: &str) -> Result<&'static PlatformPolicy, ResolveError> {
    let platform: Platform = id
        .parse()
        .map_err(|_| ResolveError::UnknownPlatform(id.to_string()))?;
    Ok(policy_for(platform))
}
