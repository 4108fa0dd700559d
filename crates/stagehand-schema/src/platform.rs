//! Target platform identifiers.

/// A packaging target platform.
///
/// The set is closed: staging rules exist only for platforms listed here,
/// and policy lookup for anything else fails before resolution starts.
///
/// # Example
///
/// ```
/// use stagehand_schema::Platform;
///
/// let p: Platform = "ios".parse().unwrap();
/// assert!(p.uses_network_file_server());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Desktop Windows.
    Windows,
    /// Desktop macOS.
    Mac,
    /// Linux staged directory with the common startup shim.
    Linux,
    /// iOS app bundle.
    Ios,
    /// tvOS app bundle.
    Tvos,
}

impl Platform {
    /// All supported platforms, in declaration order.
    pub const ALL: [Platform; 5] = [
        Platform::Windows,
        Platform::Mac,
        Platform::Linux,
        Platform::Ios,
        Platform::Tvos,
    ];

    /// Canonical lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Mac => "mac",
            Self::Linux => "linux",
            Self::Ios => "ios",
            Self::Tvos => "tvos",
        }
    }

    /// Whether non-cooked content on this platform is served over a network
    /// file interface instead of being copied into the package.
    pub fn uses_network_file_server(&self) -> bool {
        matches!(self, Self::Ios | Self::Tvos)
    }

    /// Whether staged executables need the executable permission applied
    /// after copy.
    pub fn uses_executable_bit(&self) -> bool {
        matches!(self, Self::Mac | Self::Linux | Self::Ios | Self::Tvos)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win64" => Ok(Self::Windows),
            "mac" | "macos" | "darwin" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            "ios" => Ok(Self::Ios),
            "tvos" => Ok(Self::Tvos),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}
