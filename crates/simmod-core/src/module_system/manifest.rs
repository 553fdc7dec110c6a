use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::Dependency;
use crate::module_system::version::Version;

/// Module metadata that lives outside the compiled module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique module name
    pub name: String,

    /// Version as written in the manifest
    #[serde(rename = "version")]
    pub version_str: String,

    /// Parsed form of `version_str`; zero when it did not parse
    #[serde(skip)]
    pub version: Version,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub category: ModuleCategory,

    /// Shared library implementing the module
    #[serde(rename = "library")]
    pub library_path: PathBuf,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Module API revision the library was built against; must be positive
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Capability bitmap, opaque to the registry
    #[serde(default)]
    pub capabilities: u32,

    #[serde(default)]
    pub auto_initialize: bool,

    #[serde(default)]
    pub auto_activate: bool,
}

fn default_api_version() -> u32 {
    crate::kernel::constants::MODULE_API_VERSION
}

impl Manifest {
    /// Create a manifest with the required fields.
    /// `version` is parsed leniently; an unparseable string leaves `0.0.0`
    /// and is reported by manifest validation.
    pub fn new(
        name: &str,
        version: &str,
        category: ModuleCategory,
        library_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.to_string(),
            version_str: version.to_string(),
            version: Version::parse(version).unwrap_or_default(),
            author: String::new(),
            description: String::new(),
            category,
            library_path: library_path.into(),
            dependencies: Vec::new(),
            api_version: default_api_version(),
            capabilities: 0,
            auto_initialize: false,
            auto_activate: false,
        }
    }

    /// Re-derive `version` from `version_str`, after deserialization.
    pub fn refresh_version(&mut self) -> &mut Self {
        self.version = Version::parse(&self.version_str).unwrap_or_default();
        self
    }

    pub fn add_dependency(&mut self, dependency: Dependency) -> &mut Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn has_capability(&self, flag: u32) -> bool {
        self.capabilities & flag == flag
    }
}

/// Builder for creating a manifest
pub struct ManifestBuilder {
    manifest: Manifest,
}

impl ManifestBuilder {
    pub fn new(name: &str, version: &str, category: ModuleCategory) -> Self {
        Self {
            manifest: Manifest::new(name, version, category, format!("lib{}.so", name)),
        }
    }

    pub fn author(mut self, author: &str) -> Self {
        self.manifest.author = author.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = description.to_string();
        self
    }

    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest.library_path = path.into();
        self
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.manifest.add_dependency(dependency);
        self
    }

    pub fn api_version(mut self, api_version: u32) -> Self {
        self.manifest.api_version = api_version;
        self
    }

    pub fn capabilities(mut self, capabilities: u32) -> Self {
        self.manifest.capabilities = capabilities;
        self
    }

    pub fn auto_initialize(mut self, enabled: bool) -> Self {
        self.manifest.auto_initialize = enabled;
        self
    }

    pub fn auto_activate(mut self, enabled: bool) -> Self {
        self.manifest.auto_activate = enabled;
        self
    }

    pub fn build(self) -> Manifest {
        self.manifest
    }
}
