//! # simmod-core
//!
//! Module registry and dependency resolution runtime for pluggable
//! simulation physics. See [`module_system`] for the registry itself and
//! [`config`] for host-side settings.
pub mod config;
pub mod kernel;
pub mod module_system;

pub use config::RegistryConfig;
pub use kernel::error::Error as KernelError;
pub use module_system::{
    Capability, DefaultModuleManager, Dependency, DynamicLibraryLoader, Manifest, ModuleCategory,
    ModuleData, ModuleId, ModuleInterface, ModuleManager, ModuleParameters, ModuleRegistry,
    ModuleSystemError, ValidationOptions, Validator, Version,
};

#[cfg(test)]
mod tests;
