//! # Module Loading
//!
//! A [`ModuleLoader`] turns a library path into a [`ModuleInterface`]. The
//! registry stores whatever [`LoadedModule::library`] it is handed and drops
//! it after the interface, so code from a shared library stays mapped for as
//! long as the module is registered.
//!
//! Shared-library modules export one symbol, [`ENTRY_SYMBOL`], which returns a
//! heap-allocated interface. The [`export_module!`](crate::export_module)
//! macro writes it:
//!
//! ```ignore
//! fn build() -> simmod_core::ModuleInterface {
//!     simmod_core::ModuleInterface::builder("sage_cooling", "1.2.0", ModuleCategory::Cooling)
//!         .on_initialize(|_| Ok(ModuleData::empty()))
//!         .build()
//! }
//! simmod_core::export_module!(build);
//! ```
use std::collections::HashMap;
use std::fmt;
use std::panic;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::debug;
use thiserror::Error;

use crate::kernel::constants::ENTRY_SYMBOL;
use crate::module_system::interface::ModuleInterface;

/// Signature of the exported entry point
pub type ModuleEntryFn = unsafe extern "C-unwind" fn() -> *mut ModuleInterface;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open library '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("library '{}' does not export '{symbol}': {source}", .path.display())]
    MissingSymbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("entry point of '{}' returned no interface", .path.display())]
    NullInterface { path: PathBuf },

    #[error("entry point of '{}' panicked: {message}", .path.display())]
    Panicked { path: PathBuf, message: String },

    #[error("no module is known at '{}'", .path.display())]
    Unknown { path: PathBuf },
}

/// A module interface together with the library that backs it
pub struct LoadedModule {
    pub interface: ModuleInterface,
    /// `None` for modules compiled into the host
    pub library: Option<Library>,
    pub path: PathBuf,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("interface", &self.interface)
            .field("dynamic", &self.library.is_some())
            .field("path", &self.path)
            .finish()
    }
}

/// Produces module interfaces from library paths
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError>;
}

/// Loads modules from shared libraries with `libloading`
#[derive(Debug, Clone)]
pub struct DynamicLibraryLoader {
    symbol: String,
}

impl Default for DynamicLibraryLoader {
    fn default() -> Self {
        Self {
            symbol: ENTRY_SYMBOL.to_string(),
        }
    }
}

impl DynamicLibraryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different entry point name
    pub fn with_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl ModuleLoader for DynamicLibraryLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let entry: ModuleEntryFn = {
            let symbol: Symbol<ModuleEntryFn> = unsafe { library.get(self.symbol.as_bytes()) }
                .map_err(|source| LoadError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: self.symbol.clone(),
                    source,
                })?;
            *symbol
        };

        let raw = panic::catch_unwind(|| unsafe { entry() }).map_err(|payload| LoadError::Panicked {
            path: path.to_path_buf(),
            message: panic_message(payload.as_ref()),
        })?;
        if raw.is_null() {
            return Err(LoadError::NullInterface {
                path: path.to_path_buf(),
            });
        }
        // Ownership of the interface moves to the host; the library stays open in `LoadedModule`.
        let interface = unsafe { Box::from_raw(raw) };

        debug!("Loaded module '{}' from {}", interface.name, path.display());
        Ok(LoadedModule {
            interface: *interface,
            library: Some(library),
            path: path.to_path_buf(),
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

type Factory = Box<dyn Fn() -> ModuleInterface + Send + Sync>;

/// Serves modules compiled into the host, keyed by the library path a
/// manifest names. Used where no shared library exists, such as tests and
/// embedded builds.
#[derive(Default)]
pub struct StaticModuleLoader {
    factories: HashMap<PathBuf, Factory>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<F>(&mut self, path: impl Into<PathBuf>, factory: F)
    where
        F: Fn() -> ModuleInterface + Send + Sync + 'static,
    {
        self.factories.insert(path.into(), Box::new(factory));
    }

    pub fn with<F>(mut self, path: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn() -> ModuleInterface + Send + Sync + 'static,
    {
        self.insert(path, factory);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, LoadError> {
        let factory = self.factories.get(path).ok_or_else(|| LoadError::Unknown {
            path: path.to_path_buf(),
        })?;
        Ok(LoadedModule {
            interface: factory(),
            library: None,
            path: path.to_path_buf(),
        })
    }
}

impl fmt::Debug for StaticModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticModuleLoader")
            .field("paths", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Export a module from a `cdylib` crate.
///
/// Takes a function returning the module's [`ModuleInterface`].
#[macro_export]
macro_rules! export_module {
    ($build:path) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C-unwind" fn simmod_module_entry()
        -> *mut $crate::module_system::interface::ModuleInterface {
            ::std::boxed::Box::into_raw(::std::boxed::Box::new($build()))
        }
    };
}
