//! # Manifest Loading
//!
//! Reads module manifests from disk. Two formats are understood:
//!
//! - flat `key: value` text (the `.manifest` extension), with `#` comments
//! - JSON (`.json`), deserialized straight into [`Manifest`]
//!
//! A key-value manifest looks like this:
//!
//! ```text
//! name: sage_cooling
//! version: 1.2.0
//! type: cooling
//! library: libsage_cooling.so
//! dependency.0: infall: 1.0.0
//! dependency.1: sage_metals[optional,exact]: 2.0.0
//! ```
//!
//! Relative `library` paths are resolved against the manifest's directory.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use log::{debug, warn};
use thiserror::Error;
use tokio::fs;

use crate::kernel::constants::MANIFEST_EXTENSION;
use crate::module_system::category::ModuleCategory;
use crate::module_system::dependency::Dependency;
use crate::module_system::manifest::Manifest;
use crate::module_system::version::Version;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        reason: String,
    },

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{}': {source}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ManifestError>,
    },
}

impl ManifestError {
    fn in_file(self, path: &Path) -> Self {
        match self {
            e @ (ManifestError::Io { .. } | ManifestError::InFile { .. }) => e,
            other => ManifestError::InFile {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

type Result<T> = std::result::Result<T, ManifestError>;

/// Parse key-value manifest text.
///
/// `base_dir` is used to resolve a relative `library` path.
pub fn parse_manifest(text: &str, base_dir: Option<&Path>) -> Result<Manifest> {
    let mut name = None;
    let mut version = None;
    let mut category = None;
    let mut library = None;
    let mut author = String::new();
    let mut description = String::new();
    let mut api_version = None;
    let mut capabilities = 0;
    let mut auto_initialize = false;
    let mut auto_activate = false;
    let mut dependencies: Vec<(u32, Dependency)> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(ManifestError::Syntax {
                line,
                message: format!("expected 'key: value', found '{}'", trimmed),
            });
        };
        let key = key.trim();
        let value = value.trim();
        let invalid = |reason: String| ManifestError::InvalidValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };

        match key {
            "name" => name = Some(value.to_string()),
            "version" => version = Some(value.to_string()),
            "author" => author = value.to_string(),
            "description" => description = value.to_string(),
            "type" => {
                let parsed = ModuleCategory::from_name(value)
                    .ok_or_else(|| invalid("not a module category".to_string()))?;
                category = Some(parsed);
            }
            "library" => library = Some(PathBuf::from(value)),
            "api_version" => {
                let parsed = value.parse::<u32>().map_err(|e| invalid(e.to_string()))?;
                api_version = Some(parsed);
            }
            "capabilities" => capabilities = parse_capabilities(value).map_err(invalid)?,
            "auto_initialize" => auto_initialize = parse_bool(value).map_err(invalid)?,
            "auto_activate" => auto_activate = parse_bool(value).map_err(invalid)?,
            _ => match key.strip_prefix("dependency.") {
                Some(ordinal) => {
                    let ordinal = ordinal
                        .parse::<u32>()
                        .map_err(|_| ManifestError::Syntax {
                            line,
                            message: format!("bad dependency key '{}'", key),
                        })?;
                    let dependency = parse_dependency(value).map_err(invalid)?;
                    dependencies.push((ordinal, dependency));
                }
                None => warn!("Ignoring unknown manifest key '{}' on line {}", key, line),
            },
        }
    }

    let name = name.ok_or(ManifestError::MissingField("name"))?;
    let version = version.ok_or(ManifestError::MissingField("version"))?;
    let category = category.ok_or(ManifestError::MissingField("type"))?;
    let library = library.ok_or(ManifestError::MissingField("library"))?;

    let mut manifest = Manifest::new(&name, &version, category, resolve_library(library, base_dir));
    manifest.author = author;
    manifest.description = description;
    if let Some(api_version) = api_version {
        manifest.api_version = api_version;
    }
    manifest.capabilities = capabilities;
    manifest.auto_initialize = auto_initialize;
    manifest.auto_activate = auto_activate;

    dependencies.sort_by_key(|(ordinal, _)| *ordinal);
    manifest.dependencies = dependencies.into_iter().map(|(_, d)| d).collect();
    Ok(manifest)
}

/// Parse a JSON manifest; field names follow the key-value format.
pub fn parse_manifest_json(text: &str, base_dir: Option<&Path>) -> Result<Manifest> {
    let mut manifest: Manifest = serde_json::from_str(text)?;
    manifest.refresh_version();
    manifest.library_path = resolve_library(std::mem::take(&mut manifest.library_path), base_dir);
    Ok(manifest)
}

/// Read and parse a manifest file, choosing the format by extension.
pub async fn load_manifest(path: &Path) -> Result<Manifest> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let base_dir = path.parent();
    let parsed = if is_json(path) {
        parse_manifest_json(&text, base_dir)
    } else {
        parse_manifest(&text, base_dir)
    };
    let manifest = parsed.map_err(|e| e.in_file(path))?;
    debug!("Loaded manifest for '{}' from {}", manifest.name, path.display());
    Ok(manifest)
}

/// Whether `path` names a manifest file: `*.manifest` or `*.manifest.json`
pub fn is_manifest_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let key_value = format!(".{}", MANIFEST_EXTENSION);
    let json = format!(".{}.json", MANIFEST_EXTENSION);
    file_name.ends_with(&key_value) || file_name.ends_with(&json)
}

/// Every manifest file under `dir`, recursively, sorted by path
pub async fn discover_manifests(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    scan_directory_boxed(dir.to_path_buf(), &mut found).await?;
    found.sort();
    Ok(found)
}

fn scan_directory_boxed<'a>(
    dir: PathBuf,
    found: &'a mut Vec<PathBuf>,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(scan_directory_inner(dir, found))
}

async fn scan_directory_inner(dir: PathBuf, found: &mut Vec<PathBuf>) -> Result<()> {
    let io_error = |source| ManifestError::Io {
        path: dir.clone(),
        source,
    };
    let mut entries = fs::read_dir(&dir).await.map_err(io_error)?;

    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if file_type.is_dir() {
            scan_directory_boxed(path, found).await?;
        } else if is_manifest_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn resolve_library(library: PathBuf, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(base) if library.is_relative() => base.join(library),
        _ => library,
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err("expected true/false, yes/no or 1/0".to_string()),
    }
}

fn parse_capabilities(value: &str) -> std::result::Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed.map_err(|e| e.to_string())
}

/// `<target>[flags]: <min>[: <max>]`
fn parse_dependency(value: &str) -> std::result::Result<Dependency, String> {
    let mut parts = value.split(':').map(str::trim);
    let head = parts.next().unwrap_or_default();
    let min = parts.next().filter(|s| !s.is_empty());
    let max = parts.next().filter(|s| !s.is_empty());
    if parts.next().is_some() {
        return Err("too many ':' separated fields".to_string());
    }

    let (target, flags) = match head.split_once('[') {
        Some((target, rest)) => {
            let flags = rest
                .strip_suffix(']')
                .ok_or_else(|| "unterminated flag list".to_string())?;
            (target.trim(), flags)
        }
        None => (head, ""),
    };
    if target.is_empty() {
        return Err("dependency has no target".to_string());
    }

    let mut dependency = match ModuleCategory::from_name(target) {
        Some(category) => Dependency::on_category(category),
        None => Dependency::on_name(target),
    };

    let mut exact = false;
    for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match flag {
            "optional" => dependency = dependency.optional(),
            "exact" => exact = true,
            other => return Err(format!("unknown dependency flag '{}'", other)),
        }
    }

    let parse_version = |text: &str| Version::parse(text).map_err(|e| e.to_string());
    let min = min.map(parse_version).transpose()?;
    let max = max.map(parse_version).transpose()?;

    dependency.min_version = min;
    dependency.max_version = max;
    dependency.exact_match = exact;
    Ok(dependency)
}
