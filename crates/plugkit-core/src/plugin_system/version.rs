use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version; // Numeric comparison is delegated to semver

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("'{0}' has invalid format")]
    InvalidFormat(String),
}

/// Version of a plugin or of a dependency requirement.
///
/// Accepts `MAJOR`, `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`; missing components
/// are zero. A `-prerelease` suffix is only allowed on full triples.
/// Comparison is numeric, so `1.0 == 1.0.0`, but `Display` reproduces the
/// precision the version was written with so error messages quote it as
/// declared.
#[derive(Debug, Clone)]
pub struct PluginVersion {
    version: Version,
    /// Number of components written, 1 to 3
    precision: u8,
}

impl PluginVersion {
    /// Creates a full `major.minor.patch` version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
            precision: 3,
        }
    }

    /// Parses a version string like "1", "1.2" or "1.2.3"
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidFormat(text.to_string());

        let (numbers, prerelease) = match text.split_once('-') {
            Some((numbers, pre)) => (numbers, Some(pre)),
            None => (text, None),
        };
        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 3
            || parts
                .iter()
                .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(invalid());
        }
        if prerelease.is_some() && parts.len() != 3 {
            return Err(invalid());
        }

        let mut normalized: Vec<&str> = parts.clone();
        normalized.resize(3, "0");
        let mut normalized = normalized.join(".");
        if let Some(pre) = prerelease {
            normalized.push('-');
            normalized.push_str(pre);
        }

        // semver rejects leading zeros and malformed prerelease identifiers
        let version = Version::parse(&normalized).map_err(|_| invalid())?;
        Ok(Self {
            version,
            precision: parts.len() as u8,
        })
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// Returns a reference to the underlying `semver::Version`.
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// Whether a provider declaring `self` as its version and `compat_version`
    /// as the oldest version it stays compatible with satisfies `required`.
    ///
    /// The provider satisfies the requirement iff
    /// `compat_version <= required <= self`.
    pub fn provides(&self, compat_version: &PluginVersion, required: &PluginVersion) -> bool {
        compat_version <= required && required <= self
    }
}

impl PartialEq for PluginVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for PluginVersion {}

impl Hash for PluginVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
    }
}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl FromStr for PluginVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginVersion::parse(s)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            1 => write!(f, "{}", self.version.major),
            2 => write!(f, "{}.{}", self.version.major, self.version.minor),
            _ => write!(f, "{}", self.version),
        }
    }
}
