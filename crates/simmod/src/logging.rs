//! Log output for the `simmod` binary.
//!
//! `simmod-core` logs through the `log` facade; the subscriber installed here
//! picks those records up through its `tracing-log` bridge and writes them to
//! stderr, leaving stdout to command output.
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor a configured filter is set
pub const DEFAULT_FILTER: &str = "info";

/// Filter directive to use: `RUST_LOG` wins, then `configured`, then [`DEFAULT_FILTER`]
pub fn filter_directive(configured: Option<&str>, rust_log: Option<&str>) -> String {
    rust_log
        .or(configured)
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(configured: Option<&str>) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(configured, rust_log.as_deref());
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}': {}; using '{}'", directive, e, DEFAULT_FILTER);
        EnvFilter::new(DEFAULT_FILTER)
    });

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .try_init();
}
