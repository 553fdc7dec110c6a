use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::Dependency;
use crate::module_system::function::FunctionRegistry;
use crate::module_system::manifest::Manifest;
use crate::module_system::version::{Version, VersionError};

/// Failure reported by a module's own code, surfaced verbatim to callers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module error {code}: {message}")]
pub struct ModuleFailure {
    pub code: i32,
    pub message: String,
}

impl ModuleFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// State a module produces in `initialize`.
///
/// The registry owns it until the matching cleanup; dropping it releases
/// whatever the module allocated.
pub struct ModuleData(Box<dyn Any + Send>);

impl ModuleData {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Data for modules that keep no state
    pub fn empty() -> Self {
        Self::new(())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for ModuleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleData").finish_non_exhaustive()
    }
}

/// Parameters handed to a module's `initialize` callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleParameters {
    values: BTreeMap<String, serde_json::Value>,
}

impl ModuleParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter converted to `T`; `None` if missing or of the wrong shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let json_value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` on top of these parameters
    pub fn merge(&mut self, other: &ModuleParameters) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

/// Snapshot of the halo a physics entry point operates on
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HaloState {
    pub hot_gas: f64,
    pub cold_gas: f64,
    pub stellar_mass: f64,
    pub virial_velocity: f64,
    pub virial_radius: f64,
    pub redshift: f64,
}

/// Entry point every `Cooling` module provides
pub trait CoolingModel: Send {
    /// Mass cooled from the hot halo onto the disk over `dt`
    fn cooling_mass(
        &self,
        data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure>;
}

/// Entry point every `StarFormation` module provides
pub trait StarFormationModel: Send {
    /// Stellar mass formed from cold gas over `dt`
    fn stars_formed(
        &self,
        data: &ModuleData,
        halo: &HaloState,
        dt: f64,
    ) -> Result<f64, ModuleFailure>;
}

/// Category-specific entry points a module carries.
///
/// Categories with nothing beyond the base lifecycle use `Base`.
pub enum Capability {
    Base,
    Cooling(Box<dyn CoolingModel>),
    StarFormation(Box<dyn StarFormationModel>),
}

impl Capability {
    /// Category the capability belongs to; `None` for `Base`
    pub fn category(&self) -> Option<ModuleCategory> {
        match self {
            Capability::Base => None,
            Capability::Cooling(_) => Some(ModuleCategory::Cooling),
            Capability::StarFormation(_) => Some(ModuleCategory::StarFormation),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Base => "base",
            Capability::Cooling(_) => "cooling",
            Capability::StarFormation(_) => "star_formation",
        }
    }

    /// Whether modules of `category` must carry a rich capability
    pub fn is_required_for(category: ModuleCategory) -> bool {
        matches!(category, ModuleCategory::Cooling | ModuleCategory::StarFormation)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability::{}", self.name())
    }
}

pub type InitializeFn =
    Box<dyn FnMut(&ModuleParameters) -> Result<ModuleData, ModuleFailure> + Send>;
pub type CleanupFn = Box<dyn FnMut(ModuleData) -> Result<(), ModuleFailure> + Send>;

/// The common interface every module presents to the registry
pub struct ModuleInterface {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub category: ModuleCategory,
    pub dependencies: Vec<Dependency>,
    pub manifest: Option<Manifest>,
    initialize: Option<InitializeFn>,
    cleanup: Option<CleanupFn>,
    capability: Capability,
    functions: Option<FunctionRegistry>,
}

impl ModuleInterface {
    pub fn builder(name: &str, version: &str, category: ModuleCategory) -> ModuleBuilder {
        ModuleBuilder::new(name, version, category)
    }

    pub fn parsed_version(&self) -> Result<Version, VersionError> {
        Version::parse(&self.version)
    }

    /// Version used for dependency checks; unparseable strings count as `0.0.0`
    pub fn version_or_default(&self) -> Version {
        self.parsed_version().unwrap_or_default()
    }

    pub fn has_initialize(&self) -> bool {
        self.initialize.is_some()
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn functions(&self) -> Option<&FunctionRegistry> {
        self.functions.as_ref()
    }

    /// Number of externally callable functions
    pub fn exported_function_count(&self) -> usize {
        self.functions.as_ref().map_or(0, FunctionRegistry::len)
    }

    /// Declared dependencies, falling back to the manifest's list
    pub fn effective_dependencies(&self) -> &[Dependency] {
        if !self.dependencies.is_empty() {
            return &self.dependencies;
        }
        self.manifest
            .as_ref()
            .map_or(&[][..], |m| m.dependencies.as_slice())
    }

    pub fn attach_manifest(&mut self, manifest: Manifest) {
        self.manifest = Some(manifest);
    }

    /// `None` when the module has no initializer
    pub(crate) fn run_initialize(
        &mut self,
        params: &ModuleParameters,
    ) -> Option<Result<ModuleData, ModuleFailure>> {
        self.initialize.as_mut().map(|init| (*init)(params))
    }

    /// A module without a cleanup callback just drops its data
    pub(crate) fn run_cleanup(&mut self, data: ModuleData) -> Result<(), ModuleFailure> {
        match self.cleanup.as_mut() {
            Some(cleanup) => (*cleanup)(data),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ModuleInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInterface")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("category", &self.category)
            .field("capability", &self.capability)
            .field("dependencies", &self.dependencies)
            .field("has_initialize", &self.has_initialize())
            .field("has_cleanup", &self.has_cleanup())
            .field("functions", &self.exported_function_count())
            .finish_non_exhaustive()
    }
}

/// Builder for creating a module interface
pub struct ModuleBuilder {
    interface: ModuleInterface,
}

impl ModuleBuilder {
    pub fn new(name: &str, version: &str, category: ModuleCategory) -> Self {
        Self {
            interface: ModuleInterface {
                name: name.to_string(),
                version: version.to_string(),
                author: String::new(),
                description: String::new(),
                category,
                dependencies: Vec::new(),
                manifest: None,
                initialize: None,
                cleanup: None,
                capability: Capability::Base,
                functions: None,
            },
        }
    }

    pub fn author(mut self, author: &str) -> Self {
        self.interface.author = author.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.interface.description = description.to_string();
        self
    }

    pub fn on_initialize<F>(mut self, init: F) -> Self
    where
        F: FnMut(&ModuleParameters) -> Result<ModuleData, ModuleFailure> + Send + 'static,
    {
        self.interface.initialize = Some(Box::new(init));
        self
    }

    pub fn on_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: FnMut(ModuleData) -> Result<(), ModuleFailure> + Send + 'static,
    {
        self.interface.cleanup = Some(Box::new(cleanup));
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.interface.capability = capability;
        self
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.interface.dependencies.push(dependency);
        self
    }

    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.interface.manifest = Some(manifest);
        self
    }

    pub fn function<F>(mut self, name: &str, arity: usize, func: F) -> Self
    where
        F: Fn(&ModuleData, &[f64]) -> Result<f64, ModuleFailure> + Send + Sync + 'static,
    {
        self.interface
            .functions
            .get_or_insert_with(FunctionRegistry::new)
            .register(name, arity, func);
        self
    }

    pub fn build(self) -> ModuleInterface {
        self.interface
    }
}
