use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physics process a module implements.
///
/// At most one module per category is active at any time. `Unknown` is a
/// sentinel and is never accepted as a module's own category or as a
/// dependency target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    Infall,
    Cooling,
    StarFormation,
    Feedback,
    Reincorporation,
    DiskInstability,
    Mergers,
    Misc,
    Unknown,
}

impl ModuleCategory {
    /// Every valid category, in declaration order
    pub const ALL: [ModuleCategory; 8] = [
        ModuleCategory::Infall,
        ModuleCategory::Cooling,
        ModuleCategory::StarFormation,
        ModuleCategory::Feedback,
        ModuleCategory::Reincorporation,
        ModuleCategory::DiskInstability,
        ModuleCategory::Mergers,
        ModuleCategory::Misc,
    ];

    /// Canonical manifest name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCategory::Infall => "infall",
            ModuleCategory::Cooling => "cooling",
            ModuleCategory::StarFormation => "star_formation",
            ModuleCategory::Feedback => "feedback",
            ModuleCategory::Reincorporation => "reincorporation",
            ModuleCategory::DiskInstability => "disk_instability",
            ModuleCategory::Mergers => "mergers",
            ModuleCategory::Misc => "misc",
            ModuleCategory::Unknown => "unknown",
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, ModuleCategory::Unknown)
    }

    /// Parses a category name, case-insensitively, accepting `-` for `_`.
    /// Returns `None` for anything that is not a valid category.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleCategory::from_name(s).ok_or_else(|| format!("Unknown module category: '{}'", s))
    }
}
