//! # Module Validation
//!
//! Structural checks over module interfaces, manifests and declared
//! dependencies. A [`Validator`] never fails: it collects graded
//! [`ValidationIssue`]s and the caller decides, through
//! [`ValidationResult::has_errors`], whether the outcome is fatal.
//! With [`ValidationOptions::strict`] any warning counts as an error.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::MAX_VALIDATION_ISSUES;
use crate::module_system::category::ModuleCategory;
use crate::module_system::interface::{Capability, ModuleInterface};
use crate::module_system::manifest::Manifest;
use crate::module_system::registry::{ModuleId, ModuleRegistry};
use crate::module_system::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Where an issue originated, when it can be traced to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    /// Module or manifest the issue concerns
    pub component: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.component, self.message)?;
        if let Some(location) = &self.location {
            match location.line {
                Some(line) => write!(f, " ({}:{})", location.file, line)?,
                None => write!(f, " ({})", location.file)?,
            }
        }
        Ok(())
    }
}

/// Which checks to run and how to grade them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub interface: bool,
    pub function_sigs: bool,
    pub dependencies: bool,
    pub manifest: bool,
    /// Treat warnings as errors
    pub strict: bool,
    /// Emit informational notes
    pub verbose: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            interface: true,
            function_sigs: true,
            dependencies: true,
            manifest: true,
            strict: false,
            verbose: false,
        }
    }
}

/// Issues collected by a validation run.
///
/// Only the first [`MAX_VALIDATION_ISSUES`] are stored; the severity counts
/// cover every issue reported, stored or not.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    issues: Vec<ValidationIssue>,
    info_count: usize,
    warning_count: usize,
    error_count: usize,
    dropped: usize,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Info => self.info_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Error => self.error_count += 1,
        }
        self.store(issue);
    }

    fn store(&mut self, issue: ValidationIssue) {
        if self.issues.len() >= MAX_VALIDATION_ISSUES {
            self.dropped += 1;
        } else {
            self.issues.push(issue);
        }
    }

    /// Append every issue of `other`, keeping its counts
    pub fn merge(&mut self, other: ValidationResult) {
        self.info_count += other.info_count;
        self.warning_count += other.warning_count;
        self.error_count += other.error_count;
        self.dropped += other.dropped;
        for issue in other.issues {
            self.store(issue);
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Issues reported after the store was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.info_count + self.warning_count + self.error_count == 0
    }

    /// Verdict for `options`: errors always fail, warnings fail only when strict
    pub fn has_errors(&self, options: &ValidationOptions) -> bool {
        self.error_count > 0 || (options.strict && self.warning_count > 0)
    }

    /// Messages of the issues that make the result fail under `options`
    pub fn failure_messages(&self, options: &ValidationOptions) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| {
                i.severity == Severity::Error
                    || (options.strict && i.severity == Severity::Warning)
            })
            .map(|i| i.message.clone())
            .collect()
    }
}

/// Accumulates issues across any combination of checks
#[derive(Debug)]
pub struct Validator {
    options: ValidationOptions,
    result: ValidationResult,
    location: Option<SourceLocation>,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self {
            options,
            result: ValidationResult::new(),
            location: None,
        }
    }

    /// Attach `file` to every issue reported from now on
    pub fn with_source(mut self, file: impl Into<String>) -> Self {
        self.location = Some(SourceLocation { file: file.into(), line: None });
        self
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    pub fn finish(self) -> ValidationResult {
        self.result
    }

    fn report(&mut self, severity: Severity, component: &str, message: String) {
        if severity == Severity::Info && !self.options.verbose {
            return;
        }
        self.result.add(ValidationIssue {
            severity,
            message,
            component: component.to_string(),
            location: self.location.clone(),
        });
    }

    fn error(&mut self, component: &str, message: String) {
        self.report(Severity::Error, component, message);
    }

    fn warning(&mut self, component: &str, message: String) {
        self.report(Severity::Warning, component, message);
    }

    fn info(&mut self, component: &str, message: String) {
        self.report(Severity::Info, component, message);
    }

    /// Structural checks on the interface itself, plus its manifest when
    /// manifest validation is enabled.
    pub fn validate_interface(&mut self, interface: &ModuleInterface) {
        let component = component_name(&interface.name);

        if interface.name.trim().is_empty() {
            self.error(&component, "module name is empty".to_string());
        }
        if interface.version.trim().is_empty() {
            self.error(&component, "module version is empty".to_string());
        } else if let Err(e) = interface.parsed_version() {
            self.error(
                &component,
                format!("module version '{}' is invalid: {}", interface.version, e),
            );
        }
        if !interface.category.is_valid() {
            self.error(
                &component,
                format!("module category '{}' is not valid", interface.category),
            );
        }
        if !interface.has_initialize() {
            self.error(&component, "module does not provide an initialize callback".to_string());
        }
        if !interface.has_cleanup() {
            self.warning(&component, "module does not provide a cleanup callback".to_string());
        }

        self.check_capability(&component, interface.category, interface.capability());

        if let Some(manifest) = &interface.manifest {
            if self.options.manifest {
                self.validate_manifest(manifest);
                self.check_manifest_agreement(&component, interface, manifest);
            }
        }
    }

    fn check_capability(
        &mut self,
        component: &str,
        category: ModuleCategory,
        capability: &Capability,
    ) {
        match capability.category() {
            Some(provided) if provided != category => self.error(
                component,
                format!(
                    "module declares category '{}' but provides '{}' entry points",
                    category,
                    capability.name()
                ),
            ),
            None if Capability::is_required_for(category) => self.error(
                component,
                format!("'{}' modules must provide the '{}' entry points", category, category),
            ),
            _ => {}
        }
    }

    fn check_manifest_agreement(
        &mut self,
        component: &str,
        interface: &ModuleInterface,
        manifest: &Manifest,
    ) {
        if manifest.name != interface.name {
            self.warning(
                component,
                format!(
                    "manifest name '{}' differs from module name '{}'",
                    manifest.name, interface.name
                ),
            );
        }
        if let Ok(version) = interface.parsed_version() {
            if Version::parse(&manifest.version_str).is_ok_and(|v| v != version) {
                self.warning(
                    component,
                    format!(
                        "manifest version '{}' differs from module version '{}'",
                        manifest.version_str, interface.version
                    ),
                );
            }
        }
        if manifest.category != interface.category {
            self.warning(
                component,
                format!(
                    "manifest category '{}' differs from module category '{}'",
                    manifest.category, interface.category
                ),
            );
        }
    }

    pub fn validate_manifest(&mut self, manifest: &Manifest) {
        let component = format!("manifest:{}", component_name(&manifest.name));

        if manifest.name.trim().is_empty() {
            self.error(&component, "manifest name is empty".to_string());
        }
        if manifest.version_str.trim().is_empty() {
            self.error(&component, "manifest version is empty".to_string());
        } else if let Err(e) = Version::parse(&manifest.version_str) {
            self.error(
                &component,
                format!("manifest version '{}' is invalid: {}", manifest.version_str, e),
            );
        } else if !Version::is_strict_semver(&manifest.version_str) {
            self.info(
                &component,
                format!("version '{}' is not a full semantic version", manifest.version_str),
            );
        }
        if manifest.library_path.as_os_str().is_empty() {
            self.error(&component, "manifest library path is empty".to_string());
        }
        if !manifest.category.is_valid() {
            self.error(
                &component,
                format!("manifest category '{}' is not valid", manifest.category),
            );
        }
        if manifest.api_version == 0 {
            self.error(&component, "manifest api_version must be greater than 0".to_string());
        }

        for (index, dep) in manifest.dependencies.iter().enumerate() {
            if !dep.has_target() {
                self.error(
                    &component,
                    format!("dependency {} has neither a name nor a category", index),
                );
                continue;
            }
            let named = dep.name.as_deref().is_some_and(|n| !n.trim().is_empty());
            if dep.has_version_constraint() && !named {
                self.warning(
                    &component,
                    format!(
                        "dependency {} ({}) has version constraints but no name",
                        index,
                        dep.describe()
                    ),
                );
            }
            if dep.exact_match && dep.min_version.is_none() {
                self.error(
                    &component,
                    format!("dependency {} requests an exact match without a version", index),
                );
            }
            if dep.max_version.is_some() && dep.min_version.is_none() {
                self.warning(
                    &component,
                    format!(
                        "dependency {} has a maximum version but no minimum; it is ignored",
                        index
                    ),
                );
            }
            if let (Some(min), Some(max)) = (dep.min_version, dep.max_version) {
                if max < min && !dep.exact_match {
                    self.error(
                        &component,
                        format!(
                            "dependency {} has maximum version {} below minimum {}",
                            index, max, min
                        ),
                    );
                }
            }
        }
    }

    /// Check that the required dependencies of a registered module resolve.
    ///
    /// Named dependencies resolve to any registered module of that name;
    /// category-only dependencies need an active module of that category.
    pub fn validate_dependencies(&mut self, registry: &ModuleRegistry, module_id: ModuleId) {
        let Ok(handle) = registry.get(module_id) else {
            self.error(&format!("module#{}", module_id), "module is not registered".to_string());
            return;
        };
        let component = component_name(&handle.interface.name);

        for dep in handle.interface.effective_dependencies() {
            let resolved = match (&dep.name, dep.category) {
                (Some(name), _) => registry.find_by_name(name).is_some(),
                (None, Some(category)) => registry.active_id(category).is_some(),
                (None, None) => false,
            };
            if resolved {
                continue;
            }
            if dep.optional {
                self.info(
                    &component,
                    format!("optional dependency on {} is not available", dep.describe()),
                );
            } else {
                self.error(
                    &component,
                    format!("required dependency on {} is not available", dep.describe()),
                );
            }
        }
    }

    /// Reserved for signature checks of exported functions
    pub fn validate_function_signatures(&mut self, interface: &ModuleInterface) {
        let component = component_name(&interface.name);
        self.info(&component, "function signature validation is not implemented".to_string());
    }

    /// Run every enabled check on a registered module
    pub fn validate_module(&mut self, registry: &ModuleRegistry, module_id: ModuleId) {
        let Ok(handle) = registry.get(module_id) else {
            self.error(&format!("module#{}", module_id), "module is not registered".to_string());
            return;
        };
        if self.options.interface {
            self.validate_interface(handle.interface);
        } else if self.options.manifest {
            if let Some(manifest) = &handle.interface.manifest {
                self.validate_manifest(manifest);
            }
        }
        if self.options.function_sigs {
            self.validate_function_signatures(handle.interface);
        }
        if self.options.dependencies {
            self.validate_dependencies(registry, module_id);
        }
    }
}

fn component_name(name: &str) -> String {
    if name.trim().is_empty() {
        "<unnamed>".to_string()
    } else {
        name.to_string()
    }
}

/// Interface validation with the given options, as run by `register`
pub fn validate_interface(
    interface: &ModuleInterface,
    options: ValidationOptions,
) -> ValidationResult {
    let mut validator = Validator::new(options);
    validator.validate_interface(interface);
    validator.finish()
}

pub fn validate_manifest(manifest: &Manifest, options: ValidationOptions) -> ValidationResult {
    let mut validator = Validator::new(options);
    validator.validate_manifest(manifest);
    validator.finish()
}
