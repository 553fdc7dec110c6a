mod logging;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};

use simmod_core::kernel::constants::{APP_NAME, APP_VERSION};
use simmod_core::module_system::manifest_loader;
use simmod_core::{
    DefaultModuleManager, DynamicLibraryLoader, KernelError, ModuleManager, ModuleSystemError,
    RegistryConfig, ValidationOptions, Validator, Version,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Module registry tooling for simulation modules",
    long_about = None
)]
struct CliArgs {
    /// Log filter directive, e.g. `debug` or `simmod_core=trace`. `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate module manifests
    Validate {
        #[arg(required = true)]
        manifests: Vec<PathBuf>,
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
        /// Report informational issues too
        #[arg(long)]
        verbose: bool,
    },
    /// Compare and check module versions
    Version {
        #[command(subcommand)]
        command: VersionCommand,
    },
    /// Load every manifest in a directory, print the registry and shut it down
    Load {
        dir: PathBuf,
        /// Registry configuration file (JSON, YAML or TOML)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum VersionCommand {
    /// Print `less`, `equal` or `greater`
    Compare { a: String, b: String },
    /// Check a version against a range; exits 1 when incompatible
    Check {
        version: String,
        #[arg(long)]
        min: String,
        #[arg(long)]
        max: Option<String>,
        /// Require equality with `--min`
        #[arg(long)]
        exact: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let outcome = match args.command {
        Commands::Validate {
            manifests,
            strict,
            verbose,
        } => {
            logging::init_logging(args.log_level.as_deref());
            run_validate(&manifests, strict, verbose).await
        }
        Commands::Version { command } => {
            logging::init_logging(args.log_level.as_deref());
            run_version(command)
        }
        Commands::Load { dir, config } => {
            run_load(&dir, config.as_deref(), args.log_level.as_deref()).await
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            ExitCode::FAILURE
        }
    }
}

async fn run_validate(paths: &[PathBuf], strict: bool, verbose: bool) -> Result<bool, KernelError> {
    let options = ValidationOptions {
        strict,
        verbose,
        ..ValidationOptions::default()
    };

    let mut all_passed = true;
    for path in paths {
        let manifest = match manifest_loader::load_manifest(path).await {
            Ok(manifest) => manifest,
            Err(e) => {
                println!("{}: error: {}", path.display(), e);
                all_passed = false;
                continue;
            }
        };

        let mut validator = Validator::new(options).with_source(path.display().to_string());
        validator.validate_manifest(&manifest);
        let result = validator.finish();

        for issue in result.issues() {
            println!("{}", issue);
        }
        if result.dropped() > 0 {
            println!("... {} more issues not shown", result.dropped());
        }

        let passed = !result.has_errors(&options);
        println!(
            "{}: {} ({} errors, {} warnings)",
            path.display(),
            if passed { "ok" } else { "FAILED" },
            result.error_count(),
            result.warning_count()
        );
        all_passed &= passed;
    }
    Ok(all_passed)
}

fn run_version(command: VersionCommand) -> Result<bool, KernelError> {
    let parse = |text: &str| Version::parse(text).map_err(ModuleSystemError::from);
    match command {
        VersionCommand::Compare { a, b } => {
            let ordering = parse(&a)?.compare(&parse(&b)?);
            let word = match ordering {
                Ordering::Less => "less",
                Ordering::Equal => "equal",
                Ordering::Greater => "greater",
            };
            println!("{}", word);
            Ok(true)
        }
        VersionCommand::Check {
            version,
            min,
            max,
            exact,
        } => {
            let version = parse(&version)?;
            let min = parse(&min)?;
            let max = max.as_deref().map(parse).transpose()?;
            let compatible = version.is_compatible(&min, max.as_ref(), exact);
            println!("{}", if compatible { "compatible" } else { "incompatible" });
            Ok(compatible)
        }
    }
}

async fn run_load(
    dir: &Path,
    config_path: Option<&Path>,
    log_level: Option<&str>,
) -> Result<bool, KernelError> {
    let config = match config_path {
        Some(path) => Some(RegistryConfig::load(path).await),
        None => None,
    }
    .transpose();

    // The configured filter only applies once the configuration is read.
    let configured_filter = config
        .as_ref()
        .ok()
        .and_then(|c| c.as_ref())
        .and_then(|c| c.log_filter.clone());
    logging::init_logging(log_level.or(configured_filter.as_deref()));

    let config = config?.unwrap_or_default();
    info!("{} {} loading modules from {}", APP_NAME, APP_VERSION, dir.display());

    let manager = DefaultModuleManager::with_config(config, Arc::new(DynamicLibraryLoader::new()));
    let report = manager.load_directory(dir).await?;

    {
        let registry = manager.registry();
        let registry = registry.lock().await;
        println!("{:<4} {:<24} {:<10} {:<16} STATUS", "ID", "NAME", "VERSION", "CATEGORY");
        for record in registry.iter() {
            let interface = record.interface();
            println!(
                "{:<4} {:<24} {:<10} {:<16} {}",
                record.id().to_string(),
                interface.name,
                interface.version,
                interface.category.to_string(),
                record.status()
            );
        }
        println!("{} modules registered", registry.module_count());
    }

    for (path, reason) in &report.failed {
        println!("failed: {}: {}", path.display(), reason);
    }

    let shutdown_ok = match manager.shutdown().await {
        Ok(()) => true,
        Err(e) => {
            error!("Shutdown failed: {}", e);
            false
        }
    };
    Ok(report.is_clean() && shutdown_ok)
}
