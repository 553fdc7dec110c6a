use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Version string is empty")]
    Empty,
    #[error("Invalid version component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },
}

/// A `major.minor.patch` module version.
///
/// Ordering is lexicographic on the triple, so a higher major always outranks
/// any minor or patch difference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Creates a new version
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parses `"N"`, `"N.N"` or `"N.N.N"`.
    ///
    /// Missing components default to 0 and components past the third are
    /// ignored. Empty input or a non-numeric component is an error.
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let parse_part = |part: &str| -> Result<u32, VersionError> {
            let invalid = || VersionError::InvalidComponent {
                input: trimmed.to_string(),
                component: part.to_string(),
            };
            // `u32::from_str` would accept a leading '+'
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u32>().map_err(|_| invalid())
        };

        let mut parts = [0u32; 3];
        for (slot, part) in parts.iter_mut().zip(trimmed.split('.')) {
            *slot = parse_part(part)?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Three-way comparison: major, then minor, then patch.
    pub fn compare(&self, other: &Version) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
    }

    /// Checks this version against an inclusive `[min, max]` range.
    ///
    /// With `exact` set only equality with `min` is accepted and `max` is ignored.
    pub fn is_compatible(&self, min: &Version, max: Option<&Version>, exact: bool) -> bool {
        if exact {
            return self.compare(min) == Ordering::Equal;
        }
        if self.compare(min) == Ordering::Less {
            return false;
        }
        match max {
            Some(max) => self.compare(max) != Ordering::Greater,
            None => true,
        }
    }

    /// Whether `text` is a canonical semantic version (`N.N.N`, optional pre-release/build).
    pub fn is_strict_semver(text: &str) -> bool {
        semver::Version::parse(text.trim()).is_ok()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Pre-release and build metadata are dropped.
impl From<&semver::Version> for Version {
    fn from(v: &semver::Version) -> Self {
        let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
        Version::new(clamp(v.major), clamp(v.minor), clamp(v.patch))
    }
}

impl From<Version> for semver::Version {
    fn from(v: Version) -> Self {
        semver::Version::new(v.major.into(), v.minor.into(), v.patch.into())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
