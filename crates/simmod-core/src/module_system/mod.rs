//! # Simmod Module System
//!
//! Infrastructure for plugging physics modules into the simulation: each
//! module implements one process (cooling, star formation, ...) behind a
//! common [`ModuleInterface`], and at most one module per category is
//! active at a time.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: `major.minor.patch` parsing, ordering and range checks.
//! - **[`category`]**: The [`ModuleCategory`] taxonomy.
//! - **[`dependency`]**: Declared requirements on other modules, by name or
//!   by category, with optional version bounds.
//! - **[`interface`]**: [`ModuleInterface`], lifecycle callbacks, the
//!   category [`Capability`] and type-erased [`ModuleData`].
//! - **[`manifest`]** and **[`manifest_loader`]**: Module metadata and the
//!   key-value / JSON manifest formats.
//! - **[`validation`]**: Graded structural checks that never fail outright.
//! - **[`registry`]**: [`ModuleRegistry`], the lifecycle state machine and
//!   the per-category active index.
//! - **[`resolver`]**: Dependency graph and topological ordering.
//! - **[`loader`]**: Turning library paths into module interfaces.
//! - **[`manager`]**: [`ModuleManager`], the async entry point tying manifest
//!   discovery, loading and registration together.
pub mod category;
pub mod dependency;
pub mod error;
pub mod error_context;
pub mod function;
pub mod interface;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod manifest_loader;
pub mod registry;
pub mod resolver;
pub mod validation;
pub mod version;

pub use category::ModuleCategory;
pub use dependency::{Dependency, DependencyError};
pub use error::{ErrorKind, ModuleSystemError};
pub use interface::{
    Capability, CoolingModel, HaloState, ModuleData, ModuleFailure, ModuleInterface,
    ModuleParameters, StarFormationModel,
};
pub use loader::{DynamicLibraryLoader, LoadedModule, ModuleLoader, StaticModuleLoader};
pub use manager::{DefaultModuleManager, LoadReport, ModuleManager, SharedRegistry};
pub use manifest::{Manifest, ManifestBuilder};
pub use registry::{ModuleHandle, ModuleId, ModuleRegistry, ModuleStatus};
pub use validation::{Severity, ValidationOptions, ValidationResult, Validator};
pub use version::Version;

// Test module declaration
#[cfg(test)]
mod tests;
