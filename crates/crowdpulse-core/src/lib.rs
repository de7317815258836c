//! Core types and utilities for the `CrowdPulse` occupancy dashboard

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use types::{AlertEvent, LiveOccupancyEvent, Severity, SiteId};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level`. `format` selects `json` or
/// pretty output on stderr. When `file` is set, a second JSON layer writes to
/// that file through a non-blocking appender; keep the returned guard alive
/// until shutdown so buffered lines are flushed.
///
/// # Errors
///
/// Returns an error if the subscriber cannot be installed or the log file's
/// directory cannot be created.
pub fn init_logging(level: &str, format: &str, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path
                .file_name()
                .ok_or_else(|| Error::configuration("logging.file must name a file"))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().json().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let (json_layer, pretty_layer) = if format == "json" {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().pretty().with_writer(std::io::stderr)))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to initialize logging: {e}")))?;

    Ok(guard)
}
