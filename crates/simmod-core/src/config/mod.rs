//! # Registry Configuration
//!
//! [`RegistryConfig`] carries the knobs a host sets before loading modules:
//! registry capacity, validation options, directories to scan, per-module
//! initialization parameters and a default log filter.
//!
//! Configuration files are JSON, YAML (`yaml-config` feature) or TOML
//! (`toml-config` feature); the format follows the file extension.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kernel::constants::{DEFAULT_MAX_MODULES, DEFAULT_MODULES_DIR};
use crate::module_system::interface::ModuleParameters;
use crate::module_system::validation::ValidationOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error during '{operation}' on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization to '{format}' failed: {source}")]
    Serialization {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    Deserialization {
        format: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Host-side settings for the module registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry capacity in slots, unregistered slots included
    pub max_modules: usize,
    pub validation: ValidationOptions,
    /// Directories scanned for manifests
    pub module_dirs: Vec<PathBuf>,
    /// Initialization parameters, by module name
    pub parameters: BTreeMap<String, ModuleParameters>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_modules: DEFAULT_MAX_MODULES,
            validation: ValidationOptions::default(),
            module_dirs: vec![PathBuf::from(DEFAULT_MODULES_DIR)],
            parameters: BTreeMap::new(),
            log_filter: None,
        }
    }
}

impl RegistryConfig {
    /// Parameters for `module`, empty if none are configured
    pub fn parameters_for(&self, module: &str) -> ModuleParameters {
        self.parameters.get(module).cloned().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_modules == 0 {
            return Err(ConfigError::Invalid("max_modules must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| {
                ConfigError::Serialization {
                    format: "json",
                    source: Box::new(e),
                }
            }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| {
                ConfigError::Serialization {
                    format: "yaml",
                    source: Box::new(e),
                }
            }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| {
                ConfigError::Serialization {
                    format: "toml",
                    source: Box::new(e),
                }
            }),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| {
                ConfigError::Deserialization {
                    format: "json",
                    source: Box::new(e),
                }
            })?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| {
                ConfigError::Deserialization {
                    format: "yaml",
                    source: Box::new(e),
                }
            })?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| {
                ConfigError::Deserialization {
                    format: "toml",
                    source: Box::new(e),
                }
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, choosing the format by extension
    pub async fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let data = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            operation: "read_config".to_string(),
            source,
        })?;
        let config = Self::deserialize(&data, format)?;
        log::debug!("Loaded registry configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration, choosing the format by extension
    pub async fn save(&self, path: &Path) -> Result<()> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let data = self.serialize(format)?;
        tokio::fs::write(path, data).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            operation: "write_config".to_string(),
            source,
        })
    }
}
