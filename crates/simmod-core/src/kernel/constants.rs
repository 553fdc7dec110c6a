/// Application name
pub const APP_NAME: &str = "simmod";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Module API revision this host implements
pub const MODULE_API_VERSION: u32 = 1;

/// Symbol a shared-library module exports to hand over its interface
pub const ENTRY_SYMBOL: &str = "simmod_module_entry";

/// Extension of key-value manifest files (`*.manifest`, `*.manifest.json`)
pub const MANIFEST_EXTENSION: &str = "manifest";

/// Default registry capacity, in slots
pub const DEFAULT_MAX_MODULES: usize = 64;

/// Issues stored per validation run; later issues are only counted
pub const MAX_VALIDATION_ISSUES: usize = 100;

/// Errors kept per module
pub const ERROR_HISTORY_CAPACITY: usize = 16;

/// Default modules directory
pub const DEFAULT_MODULES_DIR: &str = "modules";
