//! # Module Registry
//!
//! Owns every registered module and drives its lifecycle:
//!
//! ```text
//! register -> initialize -> set_active <-> deactivate -> cleanup -> unregister
//! ```
//!
//! Records live in an arena whose index is the [`ModuleId`]. Unregistering
//! clears a slot but never removes it, so an id handed out once can only ever
//! refer to that module or to nothing. A separate category index holds at
//! most one active module per [`ModuleCategory`]; every operation keeps that
//! index and the per-record `active` flags in agreement.
use std::fmt;
use std::path::{Path, PathBuf};

use libloading::Library;
use log::{debug, info, warn};
use serde::Serialize;

use crate::kernel::constants::DEFAULT_MAX_MODULES;
use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::{Dependency, DependencyError};
use crate::module_system::error::{ModuleSystemError, Result};
use crate::module_system::error_context::ErrorContext;
use crate::module_system::interface::{ModuleData, ModuleFailure, ModuleInterface, ModuleParameters};
use crate::module_system::loader::LoadedModule;
use crate::module_system::resolver::DependencyGraph;
use crate::module_system::validation::{self, ValidationOptions};

/// Stable handle for a registered module; the arena slot index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(usize);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for ModuleId {
    fn from(index: usize) -> Self {
        ModuleId(index)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a live slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleStatus {
    Registered,
    Initialized,
    Active,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Registered => f.write_str("registered"),
            ModuleStatus::Initialized => f.write_str("initialized"),
            ModuleStatus::Active => f.write_str("active"),
        }
    }
}

/// Everything the registry keeps for one module.
///
/// Field order matters: the interface and module data are dropped before the
/// library that contains their code.
pub struct ModuleRecord {
    id: ModuleId,
    interface: ModuleInterface,
    initialized: bool,
    active: bool,
    data: Option<ModuleData>,
    parameters: Option<ModuleParameters>,
    errors: Option<ErrorContext>,
    source_path: Option<PathBuf>,
    library: Option<Library>,
}

impl ModuleRecord {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn interface(&self) -> &ModuleInterface {
        &self.interface
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn status(&self) -> ModuleStatus {
        match (self.initialized, self.active) {
            (_, true) => ModuleStatus::Active,
            (true, false) => ModuleStatus::Initialized,
            (false, false) => ModuleStatus::Registered,
        }
    }

    pub fn data(&self) -> Option<&ModuleData> {
        self.data.as_ref()
    }

    /// Parameters the module was initialized with
    pub fn parameters(&self) -> Option<&ModuleParameters> {
        self.parameters.as_ref()
    }

    pub fn error_context(&self) -> Option<&ErrorContext> {
        self.errors.as_ref()
    }

    /// Library the module was loaded from, if it was loaded dynamically
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("interface", &self.interface)
            .field("initialized", &self.initialized)
            .field("active", &self.active)
            .field("source_path", &self.source_path)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a module returned by lookups
#[derive(Debug, Clone, Copy)]
pub struct ModuleHandle<'a> {
    pub id: ModuleId,
    pub interface: &'a ModuleInterface,
    /// `None` until the module is initialized
    pub data: Option<&'a ModuleData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveEntry {
    category: ModuleCategory,
    module_id: ModuleId,
}

/// Registry for managing modules
pub struct ModuleRegistry {
    slots: Vec<Option<ModuleRecord>>,
    /// Category index, kept compact
    active: Vec<ActiveEntry>,
    capacity: usize,
    validation: ValidationOptions,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_MODULES)
    }

    /// Registry holding at most `capacity` slots over its lifetime
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            active: Vec::new(),
            capacity,
            validation: ValidationOptions::default(),
        }
    }

    /// Options used to validate interfaces on `register`
    pub fn set_validation_options(&mut self, options: ValidationOptions) {
        self.validation = options;
    }

    pub fn validation_options(&self) -> &ValidationOptions {
        &self.validation
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live (registered) modules
    pub fn module_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of slots ever allocated, tombstones included
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn initialized_count(&self) -> usize {
        self.iter().filter(|r| r.initialized).count()
    }

    /// Live records in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.slots.iter().flatten()
    }

    fn record(&self, id: ModuleId) -> Result<&ModuleRecord> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ModuleSystemError::ModuleNotFound(id))
    }

    fn record_mut(&mut self, id: ModuleId) -> Result<&mut ModuleRecord> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ModuleSystemError::ModuleNotFound(id))
    }

    /// Register a statically built module
    pub fn register(&mut self, interface: ModuleInterface) -> Result<ModuleId> {
        self.insert(interface, None, None)
    }

    /// Register a module produced by a
    /// [`ModuleLoader`](crate::module_system::loader::ModuleLoader), keeping
    /// its library loaded for as long as the record exists.
    pub fn register_loaded(&mut self, loaded: LoadedModule) -> Result<ModuleId> {
        let LoadedModule { interface, library, path } = loaded;
        self.insert(interface, library, Some(path))
    }

    fn insert(
        &mut self,
        interface: ModuleInterface,
        library: Option<Library>,
        source_path: Option<PathBuf>,
    ) -> Result<ModuleId> {
        let result = validation::validate_interface(&interface, self.validation);
        if result.dropped() > 0 {
            warn!(
                "Validation of module '{}' reported {} more issues than could be stored",
                interface.name,
                result.dropped()
            );
        }
        if result.has_errors(&self.validation) {
            return Err(ModuleSystemError::InvalidModule {
                module: interface.name.clone(),
                reasons: result.failure_messages(&self.validation),
            });
        }

        if self.slots.len() >= self.capacity {
            return Err(ModuleSystemError::OutOfCapacity { capacity: self.capacity });
        }
        if self.find_by_name(&interface.name).is_some() {
            return Err(ModuleSystemError::DuplicateName(interface.name.clone()));
        }
        if self.slots.try_reserve(1).is_err() {
            return Err(ModuleSystemError::OutOfMemory(interface.name.clone()));
        }

        let id = ModuleId(self.slots.len());
        debug!(
            "Registered module '{}' v{} ({}) as id {}",
            interface.name, interface.version, interface.category, id
        );
        self.slots.push(Some(ModuleRecord {
            id,
            interface,
            initialized: false,
            active: false,
            data: None,
            parameters: None,
            errors: None,
            source_path,
            library,
        }));
        Ok(id)
    }

    /// Run the module's initialize callback and take ownership of its data.
    /// A failure reported by the callback is kept as the module's last error.
    pub fn initialize(&mut self, id: ModuleId, params: &ModuleParameters) -> Result<()> {
        let record = self.record_mut(id)?;
        if record.initialized {
            return Err(ModuleSystemError::AlreadyInitialized {
                id,
                name: record.interface.name.clone(),
            });
        }

        let data = match record.interface.run_initialize(params) {
            Some(Ok(data)) => data,
            Some(Err(failure)) => {
                record
                    .errors
                    .get_or_insert_with(ErrorContext::new)
                    .record(failure.clone());
                return Err(ModuleSystemError::ModuleFailed {
                    name: record.interface.name.clone(),
                    operation: "initialize",
                    source: failure,
                });
            }
            None => {
                return Err(ModuleSystemError::InvalidModule {
                    module: record.interface.name.clone(),
                    reasons: vec!["module does not provide an initialize callback".to_string()],
                });
            }
        };

        record.data = Some(data);
        record.parameters = Some(params.clone());
        record.errors.get_or_insert_with(ErrorContext::new);
        record.initialized = true;
        info!("Initialized module '{}' (id {})", record.interface.name, id);
        Ok(())
    }

    /// Make `id` the active module of its category.
    ///
    /// Any other module active for the category is deactivated. Nothing is
    /// changed if the module is not initialized or a required dependency is
    /// not satisfied.
    pub fn set_active(&mut self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        if !record.initialized {
            return Err(ModuleSystemError::NotInitialized {
                id,
                name: record.interface.name.clone(),
            });
        }
        if record.active {
            return Ok(());
        }
        let category = record.interface.category;

        self.validate_runtime_dependencies(id)?;

        let previous = match self.active.iter_mut().find(|e| e.category == category) {
            Some(entry) => Some(std::mem::replace(&mut entry.module_id, id)),
            None => {
                self.active.push(ActiveEntry { category, module_id: id });
                None
            }
        };
        if let Some(previous_id) = previous {
            if let Ok(prev) = self.record_mut(previous_id) {
                prev.active = false;
                debug!(
                    "Module '{}' (id {}) replaced as active '{}' module",
                    prev.interface.name, previous_id, category
                );
            }
        }
        let record = self.record_mut(id)?;
        record.active = true;
        info!("Module '{}' (id {}) is now active for '{}'", record.interface.name, id, category);
        Ok(())
    }

    /// Remove `id` from the category index. A no-op for inactive modules.
    pub fn deactivate(&mut self, id: ModuleId) -> Result<()> {
        let record = self.record_mut(id)?;
        if !record.active {
            return Ok(());
        }
        record.active = false;
        debug!("Deactivated module '{}' (id {})", record.interface.name, id);
        self.active.retain(|e| e.module_id != id);
        Ok(())
    }

    /// Run the module's cleanup callback and release everything tied to its
    /// initialized state. A cleaned-up module is never left active.
    ///
    /// State is released even when the callback fails; the failure is then
    /// returned.
    pub fn cleanup(&mut self, id: ModuleId) -> Result<()> {
        let record = self.record_mut(id)?;
        if !record.initialized {
            return Err(ModuleSystemError::NotInitialized {
                id,
                name: record.interface.name.clone(),
            });
        }

        let data = record.data.take().unwrap_or_else(ModuleData::empty);
        let outcome = record.interface.run_cleanup(data);
        record.parameters = None;
        record.errors = None;
        record.initialized = false;
        let name = record.interface.name.clone();

        self.deactivate(id)?;
        debug!("Cleaned up module '{}' (id {})", name, id);

        outcome.map_err(|failure| ModuleSystemError::ModuleFailed {
            name,
            operation: "cleanup",
            source: failure,
        })
    }

    /// Clean up (if needed) and drop the module. The id is never reused.
    ///
    /// The slot is cleared even when the cleanup callback fails; that
    /// failure is then returned as `ModuleFailed`.
    pub fn unregister(&mut self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        let outcome = if record.initialized {
            self.cleanup(id)
        } else {
            Ok(())
        };
        self.deactivate(id)?;
        if let Some(record) = self.slots.get_mut(id.0).and_then(Option::take) {
            debug!("Unregistered module '{}' (id {})", record.interface.name, id);
        }
        outcome
    }

    pub fn get(&self, id: ModuleId) -> Result<ModuleHandle<'_>> {
        let record = self.record(id)?;
        Ok(ModuleHandle {
            id,
            interface: &record.interface,
            data: record.data.as_ref(),
        })
    }

    /// Full record, for callers that need lifecycle state as well
    pub fn get_record(&self, id: ModuleId) -> Result<&ModuleRecord> {
        self.record(id)
    }

    pub fn status(&self, id: ModuleId) -> Result<ModuleStatus> {
        self.record(id).map(ModuleRecord::status)
    }

    /// The module currently serving `category`.
    ///
    /// Should more than one index entry match, a module exposing external
    /// functions is preferred over the first match.
    pub fn get_active_by_category(&self, category: ModuleCategory) -> Result<ModuleHandle<'_>> {
        let candidates: Vec<ModuleHandle<'_>> = self
            .active
            .iter()
            .filter(|e| e.category == category)
            .filter_map(|e| self.get(e.module_id).ok())
            .collect();

        candidates
            .iter()
            .find(|h| h.interface.exported_function_count() > 0)
            .or_else(|| candidates.first())
            .copied()
            .ok_or(ModuleSystemError::NoActiveModule(category))
    }

    /// Id of the module in the category index for `category`
    pub fn active_id(&self, category: ModuleCategory) -> Option<ModuleId> {
        self.active
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.module_id)
    }

    /// Category index contents, in activation order
    pub fn active_modules(&self) -> Vec<(ModuleCategory, ModuleId)> {
        self.active.iter().map(|e| (e.category, e.module_id)).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ModuleId> {
        self.iter().find(|r| r.interface.name == name).map(|r| r.id)
    }

    /// Most recent error recorded for the module, if any
    pub fn get_last_error(&self, id: ModuleId) -> Result<Option<&ModuleFailure>> {
        Ok(self.record(id)?.errors.as_ref().and_then(ErrorContext::last))
    }

    /// Record a failure against an initialized module
    pub fn record_error(&mut self, id: ModuleId, code: i32, message: &str) -> Result<()> {
        let record = self.record_mut(id)?;
        if !record.initialized {
            return Err(ModuleSystemError::NotInitialized {
                id,
                name: record.interface.name.clone(),
            });
        }
        record
            .errors
            .get_or_insert_with(ErrorContext::new)
            .record(ModuleFailure::new(code, message));
        Ok(())
    }

    /// Invoke an exported function of an initialized module.
    /// A failure reported by the function is also recorded as the module's last error.
    pub fn call_function(&mut self, id: ModuleId, function: &str, args: &[f64]) -> Result<f64> {
        let record = self.record_mut(id)?;
        let Some(data) = record.data.as_ref().filter(|_| record.initialized) else {
            return Err(ModuleSystemError::NotInitialized {
                id,
                name: record.interface.name.clone(),
            });
        };
        let Some(func) = record.interface.functions().and_then(|f| f.get(function)) else {
            return Err(ModuleSystemError::FunctionNotFound {
                module: record.interface.name.clone(),
                function: function.to_string(),
            });
        };
        if func.arity() != args.len() {
            return Err(ModuleSystemError::InvalidArgument(format!(
                "function '{}' of module '{}' takes {} arguments, got {}",
                function,
                record.interface.name,
                func.arity(),
                args.len()
            )));
        }

        match func.call(data, args) {
            Ok(value) => Ok(value),
            Err(failure) => {
                record
                    .errors
                    .get_or_insert_with(ErrorContext::new)
                    .record(failure.clone());
                Err(ModuleSystemError::ModuleFailed {
                    name: record.interface.name.clone(),
                    operation: "call",
                    source: failure,
                })
            }
        }
    }

    /// Check every declared dependency of `id` against the active modules.
    ///
    /// Stops at the first unsatisfied required dependency. Optional
    /// dependencies never fail, whatever they resolve to.
    pub fn validate_runtime_dependencies(&self, id: ModuleId) -> Result<()> {
        let record = self.record(id)?;
        let module = &record.interface.name;

        for dep in record.interface.effective_dependencies() {
            match self.check_dependency(module, dep) {
                Ok(()) => {}
                Err(e) if dep.optional => {
                    info!("Optional dependency of '{}' not satisfied: {}", module, e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn check_dependency(
        &self,
        module: &str,
        dep: &Dependency,
    ) -> std::result::Result<(), DependencyError> {
        let not_found = || DependencyError::NotFound {
            module: module.to_string(),
            dependency: dep.describe(),
        };

        let target = match &dep.name {
            Some(name) => {
                let record = self
                    .find_by_name(name)
                    .and_then(|id| self.record(id).ok())
                    .filter(|r| r.active)
                    .ok_or_else(not_found)?;
                if let Some(expected) = dep.category {
                    if record.interface.category != expected {
                        return Err(DependencyError::CategoryConflict {
                            module: module.to_string(),
                            dependency: dep.describe(),
                            expected,
                            actual: record.interface.category,
                        });
                    }
                }
                record
            }
            None => {
                let category = dep.category.filter(ModuleCategory::is_valid).ok_or_else(not_found)?;
                self.active_id(category)
                    .and_then(|id| self.record(id).ok())
                    .ok_or_else(not_found)?
            }
        };

        let actual = target.interface.version_or_default();
        dep.check_version(&actual)
            .map_err(|(bound, required)| DependencyError::VersionConflict {
                module: module.to_string(),
                dependency: dep.describe(),
                bound,
                required,
                actual,
            })
    }

    /// Clean up every initialized module, dependents before their dependencies.
    ///
    /// Keeps going past failures and reports them together. Modules stay
    /// registered.
    pub fn shutdown(&mut self) -> Result<()> {
        let graph = DependencyGraph::from_initialized(self);
        let order = match graph.shutdown_order() {
            Ok(order) => order,
            Err(e) => {
                warn!("{}; falling back to reverse registration order", e);
                self.slots
                    .iter()
                    .rev()
                    .flatten()
                    .filter(|r| r.initialized)
                    .map(|r| r.interface.name.clone())
                    .collect()
            }
        };

        let mut failures = Vec::new();
        for name in order {
            let Some(id) = self.find_by_name(&name) else { continue };
            info!("Shutting down module '{}'", name);
            if let Err(e) = self.cleanup(id) {
                warn!("Error shutting down module '{}': {}", name, e);
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ModuleSystemError::ShutdownFailed(failures))
        }
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_count())
            .field("slots", &self.slots.len())
            .field("capacity", &self.capacity)
            .field("active", &self.active)
            .finish()
    }
}
