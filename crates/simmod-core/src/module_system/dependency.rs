use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module_system::category::ModuleCategory;
use crate::module_system::version::Version;

/// A declared requirement on another module.
///
/// Targets a module by `name`, by `category`, or both. A dependency with
/// neither is rejected by manifest validation. With `exact_match` set only
/// `min_version` is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<ModuleCategory>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exact_match: bool,
    #[serde(default)]
    pub min_version: Option<Version>,
    #[serde(default)]
    pub max_version: Option<Version>,
}

/// Which bound of a dependency's version range was violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionBound {
    Exact,
    Min,
    Max,
}

impl fmt::Display for VersionBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionBound::Exact => f.write_str("exact"),
            VersionBound::Min => f.write_str("minimum"),
            VersionBound::Max => f.write_str("maximum"),
        }
    }
}

/// Error that can occur when resolving dependencies at runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// No active module satisfies a required dependency
    #[error("Module '{module}' requires {dependency}, which is not available")]
    NotFound { module: String, dependency: String },

    /// The dependency resolved, but its version is outside the declared range
    #[error(
        "Module '{module}' requires {dependency} with {bound} version {required}, \
         but found version {actual}"
    )]
    VersionConflict {
        module: String,
        dependency: String,
        bound: VersionBound,
        required: Version,
        actual: Version,
    },

    /// The named dependency resolved to a module of a different category
    #[error(
        "Module '{module}' requires {dependency} of category '{expected}', but it is '{actual}'"
    )]
    CategoryConflict {
        module: String,
        dependency: String,
        expected: ModuleCategory,
        actual: ModuleCategory,
    },
}

impl Dependency {
    /// Required dependency on a module with the given name, any version
    pub fn on_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            category: None,
            optional: false,
            exact_match: false,
            min_version: None,
            max_version: None,
        }
    }

    /// Required dependency on whichever module is active for `category`, any version
    pub fn on_category(category: ModuleCategory) -> Self {
        Self {
            name: None,
            category: Some(category),
            optional: false,
            exact_match: false,
            min_version: None,
            max_version: None,
        }
    }

    /// Also constrain the resolved module's category
    pub fn with_category(mut self, category: ModuleCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Inclusive version range; `max` of `None` leaves it unbounded
    pub fn with_range(mut self, min: Version, max: Option<Version>) -> Self {
        self.min_version = Some(min);
        self.max_version = max;
        self.exact_match = false;
        self
    }

    pub fn exactly(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self.max_version = None;
        self.exact_match = true;
        self
    }

    pub fn is_required(&self) -> bool {
        !self.optional
    }

    /// Whether the dependency names a target at all
    pub fn has_target(&self) -> bool {
        let has_name = self.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        let has_category = self.category.is_some_and(|c| c.is_valid());
        has_name || has_category
    }

    pub fn has_version_constraint(&self) -> bool {
        self.min_version.is_some() || self.max_version.is_some()
    }

    /// Checks `version` against this dependency's range.
    ///
    /// Returns the violated bound with the version it was checked against.
    /// A dependency without `min_version` accepts any version.
    pub fn check_version(&self, version: &Version) -> Result<(), (VersionBound, Version)> {
        let Some(min) = self.min_version else {
            return Ok(());
        };
        if version.is_compatible(&min, self.max_version.as_ref(), self.exact_match) {
            return Ok(());
        }
        if self.exact_match {
            Err((VersionBound::Exact, min))
        } else if version < &min {
            Err((VersionBound::Min, min))
        } else {
            // Only the upper bound can be left once the minimum holds
            Err((VersionBound::Max, self.max_version.unwrap_or(min)))
        }
    }

    /// Short description used in error messages, e.g. `module 'sd93' (category 'cooling')`
    pub fn describe(&self) -> String {
        match (&self.name, &self.category) {
            (Some(name), Some(category)) => format!("module '{}' (category '{}')", name, category),
            (Some(name), None) => format!("module '{}'", name),
            (None, Some(category)) => format!("an active '{}' module", category),
            (None, None) => "an unnamed dependency".to_string(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement_type = if self.optional { "Optional" } else { "Requires" };
        write!(f, "{} {}", requirement_type, self.describe())?;
        match (&self.min_version, &self.max_version, self.exact_match) {
            (Some(min), _, true) => write!(f, " (version: ={})", min),
            (Some(min), Some(max), false) => write!(f, " (version: {}..={})", min, max),
            (Some(min), None, false) => write!(f, " (version: >={})", min),
            _ => write!(f, " (any version)"),
        }
    }
}
