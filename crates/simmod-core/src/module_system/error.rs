//! # Module System Errors
//!
//! [`ModuleSystemError`] is what every fallible registry, loader and manifest
//! operation returns. Each variant maps onto one [`ErrorKind`] so callers can
//! branch on the kind of failure without matching on message text.
use std::fmt;
use std::path::PathBuf;

use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::DependencyError;
use crate::module_system::interface::ModuleFailure;
use crate::module_system::loader::LoadError;
use crate::module_system::manifest_loader::ManifestError;
use crate::module_system::registry::ModuleId;
use crate::module_system::version::VersionError;

/// Failure taxonomy shared across the module system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyInitialized,
    NotInitialized,
    DependencyNotFound,
    DependencyConflict,
    OutOfCapacity,
    OutOfMemory,
    InvalidManifest,
    LoadFailed,
    DuplicateName,
    /// A module's own callback reported failure
    ModuleFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModuleSystemError {
    #[error("Invalid module '{module}': {}", .reasons.join("; "))]
    InvalidModule { module: String, reasons: Vec<String> },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No module registered with id {0}")]
    ModuleNotFound(ModuleId),

    #[error("No active module for category '{0}'")]
    NoActiveModule(ModuleCategory),

    #[error("Module '{name}' (id {id}) is already initialized")]
    AlreadyInitialized { id: ModuleId, name: String },

    #[error("Module '{name}' (id {id}) is not initialized")]
    NotInitialized { id: ModuleId, name: String },

    #[error("Dependency resolution failed: {0}")]
    Dependency(#[from] DependencyError),

    #[error("Registry is full ({capacity} module slots)")]
    OutOfCapacity { capacity: usize },

    #[error("Could not allocate a registry slot for module '{0}'")]
    OutOfMemory(String),

    #[error("A module named '{0}' is already registered")]
    DuplicateName(String),

    #[error("Module '{name}' failed during {operation}: {source}")]
    ModuleFailed {
        name: String,
        operation: &'static str,
        #[source]
        source: ModuleFailure,
    },

    #[error("Module '{module}' has no function named '{function}'")]
    FunctionNotFound { module: String, function: String },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Manifest '{}' failed validation: {}", .path.display(), .reasons.join("; "))]
    ManifestRejected { path: PathBuf, reasons: Vec<String> },

    #[error("Module loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("Version parsing error: {0}")]
    Version(#[from] VersionError),

    #[error("Circular dependency detected among modules: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    #[error("Shutdown finished with errors: {}", .0.join("; "))]
    ShutdownFailed(Vec<String>),
}

impl ModuleSystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleSystemError::InvalidModule { .. }
            | ModuleSystemError::InvalidArgument(_)
            | ModuleSystemError::Version(_) => ErrorKind::InvalidArgument,
            ModuleSystemError::ModuleNotFound(_)
            | ModuleSystemError::NoActiveModule(_)
            | ModuleSystemError::FunctionNotFound { .. } => ErrorKind::NotFound,
            ModuleSystemError::AlreadyInitialized { .. } => ErrorKind::AlreadyInitialized,
            ModuleSystemError::NotInitialized { .. } => ErrorKind::NotInitialized,
            ModuleSystemError::Dependency(DependencyError::NotFound { .. }) => {
                ErrorKind::DependencyNotFound
            }
            ModuleSystemError::Dependency(_) | ModuleSystemError::CyclicDependency(_) => {
                ErrorKind::DependencyConflict
            }
            ModuleSystemError::OutOfCapacity { .. } => ErrorKind::OutOfCapacity,
            ModuleSystemError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            ModuleSystemError::DuplicateName(_) => ErrorKind::DuplicateName,
            ModuleSystemError::ModuleFailed { .. } | ModuleSystemError::ShutdownFailed(_) => {
                ErrorKind::ModuleFailed
            }
            ModuleSystemError::Manifest(_) | ModuleSystemError::ManifestRejected { .. } => {
                ErrorKind::InvalidManifest
            }
            ModuleSystemError::Load(_) => ErrorKind::LoadFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, ModuleSystemError>;
