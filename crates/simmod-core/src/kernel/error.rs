//! # Simmod Kernel Errors
//!
//! [`Error`] is the crate-level error returned by entry points that span
//! subsystems, such as loading a configuration and then a module directory.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::ConfigError;
use crate::module_system::error::{ErrorKind, ModuleSystemError};
use crate::module_system::manifest_loader::ManifestError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Typed module system error
    #[error("Module system error: {0}")]
    ModuleSystem(#[from] ModuleSystemError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Module system failure kind, if this is a module system error
    pub fn module_error_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::ModuleSystem(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<ManifestError> for Error {
    fn from(err: ManifestError) -> Self {
        Error::ModuleSystem(ModuleSystemError::Manifest(err))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
