//! Program target descriptor (`<Target>.target` JSON).
//!
//! The build system writes a descriptor next to each compiled program
//! listing its build products and runtime dependencies. Paths in the
//! descriptor use `$(EngineDir)/` and `$(ProjectDir)/` variables; the
//! resolver expands them into engine-tree and project-tree items.

use serde::{Deserialize, Serialize};

/// Path variable prefix for files under the engine installation.
pub const ENGINE_DIR_VAR: &str = "$(EngineDir)/";
/// Path variable prefix for files under the project directory.
pub const PROJECT_DIR_VAR: &str = "$(ProjectDir)/";

/// Build product type string for debug symbol files, filtered out unless the
/// policy ships symbols.
pub const SYMBOL_FILE_TYPE: &str = "SymbolFile";

/// One compiled output of the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildProduct {
    /// Variable-prefixed path of the product.
    pub path: String,
    /// Product type, e.g. `Executable`, `DynamicLibrary`, `SymbolFile`.
    #[serde(rename = "Type")]
    pub kind: String,
}

/// One file the target needs at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeDependency {
    /// Variable-prefixed path of the dependency.
    pub path: String,
    /// How the dependency is consumed, e.g. `NonUFS`.
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

/// Parsed `.target` descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetDescriptor {
    /// Name of the compiled target; becomes the project subtree name in the
    /// package layout.
    pub target_name: String,
    /// Compiled outputs to ship.
    #[serde(default)]
    pub build_products: Vec<BuildProduct>,
    /// Runtime files to ship alongside the binaries.
    #[serde(default)]
    pub runtime_dependencies: Vec<RuntimeDependency>,
}

/// A descriptor path with its variable prefix expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandedPath {
    /// Path relative to the engine installation root.
    Engine(String),
    /// Path relative to the project root.
    Project(String),
}

/// Expand a `$(EngineDir)/` or `$(ProjectDir)/` prefixed path.
///
/// Returns `None` when the path carries neither prefix; the resolver reports
/// those as conflicts instead of guessing a root.
pub fn expand_path(path: &str) -> Option<ExpandedPath> {
    if let Some(rest) = path.strip_prefix(ENGINE_DIR_VAR) {
        Some(ExpandedPath::Engine(rest.to_string()))
    } else {
        path.strip_prefix(PROJECT_DIR_VAR)
            .map(|rest| ExpandedPath::Project(rest.to_string()))
    }
}

impl TargetDescriptor {
    /// Parse a descriptor from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` when the text is not a valid
    /// descriptor (`TargetName` is mandatory).
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Variable-prefixed paths of everything the descriptor ships:
    /// build products (minus symbol files unless `with_symbols`) followed by
    /// runtime dependencies, deduplicated, in first-seen order.
    pub fn deployment_paths(&self, with_symbols: bool) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut paths = Vec::new();
        for product in &self.build_products {
            if !with_symbols && product.kind == SYMBOL_FILE_TYPE {
                continue;
            }
            if seen.insert(product.path.clone()) {
                paths.push(product.path.clone());
            }
        }
        for dep in &self.runtime_dependencies {
            if seen.insert(dep.path.clone()) {
                paths.push(dep.path.clone());
            }
        }
        paths
    }
}
