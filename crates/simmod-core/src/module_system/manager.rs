use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::Mutex;

use crate::config::RegistryConfig;
use crate::module_system::error::{ModuleSystemError, Result};
use crate::module_system::interface::ModuleParameters;
use crate::module_system::loader::{DynamicLibraryLoader, ModuleLoader};
use crate::module_system::manifest::Manifest;
use crate::module_system::manifest_loader;
use crate::module_system::registry::{ModuleId, ModuleRegistry};
use crate::module_system::resolver::DependencyGraph;
use crate::module_system::validation::{self, ValidationOptions};

/// Registry shared between the manager and its callers
pub type SharedRegistry = Arc<Mutex<ModuleRegistry>>;

/// Outcome of loading a directory of manifests
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Registered modules, in dependency order
    pub loaded: Vec<ModuleId>,
    /// Manifests or modules that could not be loaded, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Module system component interface
#[async_trait]
pub trait ModuleManager: Send + Sync {
    /// Load, register and (per the manifest flags) start one module
    async fn load_manifest(&self, path: &Path) -> Result<ModuleId>;

    /// Load every manifest found under `dir`
    async fn load_directory(&self, dir: &Path) -> Result<LoadReport>;

    /// Clean up every initialized module, dependents first
    async fn shutdown(&self) -> Result<()>;

    fn registry(&self) -> SharedRegistry;
}

/// Default implementation of module manager
#[derive(Clone)]
pub struct DefaultModuleManager {
    registry: SharedRegistry,
    loader: Arc<dyn ModuleLoader>,
    validation: ValidationOptions,
    config: Arc<RegistryConfig>,
}

impl DefaultModuleManager {
    /// Manager with default settings and the shared-library loader
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default(), Arc::new(DynamicLibraryLoader::new()))
    }

    pub fn with_config(config: RegistryConfig, loader: Arc<dyn ModuleLoader>) -> Self {
        let mut registry = ModuleRegistry::with_capacity(config.max_modules);
        registry.set_validation_options(config.validation);
        Self {
            registry: Arc::new(Mutex::new(registry)),
            loader,
            validation: config.validation,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn parameters_for(&self, module: &str) -> ModuleParameters {
        self.config.parameters_for(module)
    }

    fn check_manifest(&self, path: &Path, manifest: &Manifest) -> Result<()> {
        let result = validation::validate_manifest(manifest, self.validation);
        for issue in result.issues() {
            info!("{}: {}", path.display(), issue);
        }
        if result.has_errors(&self.validation) {
            return Err(ModuleSystemError::ManifestRejected {
                path: path.to_path_buf(),
                reasons: result.failure_messages(&self.validation),
            });
        }
        Ok(())
    }

    /// Load the manifest's library and register it with the manifest attached
    fn register_manifest(
        &self,
        registry: &mut ModuleRegistry,
        manifest: Manifest,
    ) -> Result<ModuleId> {
        let mut loaded = self.loader.load(&manifest.library_path)?;
        loaded.interface.attach_manifest(manifest);
        registry.register_loaded(loaded)
    }

    fn start(
        &self,
        registry: &mut ModuleRegistry,
        id: ModuleId,
        manifest: &Manifest,
    ) -> Result<()> {
        if manifest.auto_initialize {
            registry.initialize(id, &self.parameters_for(&manifest.name))?;
        }
        if manifest.auto_activate {
            registry.set_active(id)?;
        }
        Ok(())
    }
}

impl Default for DefaultModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultModuleManager")
            .field("validation", &self.validation)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModuleManager for DefaultModuleManager {
    async fn load_manifest(&self, path: &Path) -> Result<ModuleId> {
        let manifest = manifest_loader::load_manifest(path).await?;
        self.check_manifest(path, &manifest)?;

        let mut registry = self.registry.lock().await;
        let id = self.register_manifest(&mut registry, manifest.clone())?;
        self.start(&mut registry, id, &manifest)?;
        info!("Loaded module '{}' from {}", manifest.name, path.display());
        Ok(id)
    }

    async fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        let mut manifests = Vec::new();
        let mut paths = Vec::new();

        for path in manifest_loader::discover_manifests(dir).await? {
            let checked = match manifest_loader::load_manifest(&path).await {
                Ok(manifest) => self.check_manifest(&path, &manifest).map(|()| manifest),
                Err(e) => Err(e.into()),
            };
            match checked {
                Ok(manifest) if manifests.iter().any(|m: &Manifest| m.name == manifest.name) => {
                    let e = ModuleSystemError::DuplicateName(manifest.name);
                    warn!("Skipping manifest {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
                Ok(manifest) => {
                    manifests.push(manifest);
                    paths.push(path);
                }
                Err(e) => {
                    warn!("Skipping manifest {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        let order = DependencyGraph::from_manifests(&manifests).initialization_order()?;

        let mut registry = self.registry.lock().await;
        let mut started = Vec::new();
        for name in &order {
            let Some(index) = manifests.iter().position(|m| &m.name == name) else {
                continue;
            };
            let manifest = &manifests[index];
            match self.register_manifest(&mut registry, manifest.clone()) {
                Ok(id) => {
                    report.loaded.push(id);
                    started.push((id, index));
                }
                Err(e) => {
                    warn!("Failed to register module '{}': {}", manifest.name, e);
                    report.failed.push((paths[index].clone(), e.to_string()));
                }
            }
        }

        // Everything is registered before anything starts, so name
        // dependencies between modules of this batch resolve.
        for (id, index) in started {
            if let Err(e) = self.start(&mut registry, id, &manifests[index]) {
                warn!("Failed to start module '{}': {}", manifests[index].name, e);
                report.failed.push((paths[index].clone(), e.to_string()));
            }
        }

        info!(
            "Loaded {} modules from {} ({} failures)",
            report.loaded.len(),
            dir.display(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn shutdown(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;
        registry.shutdown()
    }

    fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }
}
