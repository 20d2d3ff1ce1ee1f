//! Tracing setup.
//!
//! Console output always goes to stderr: stdout carries the JSON line
//! protocol. An optional rolling log file is added as a second layer.

use crate::config::{LogRotation, LoggingConfig};
use crate::error::{FusionError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE_NAME: &str = "search-fusion.log";

/// Build the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; it must
/// be held until shutdown so buffered lines are flushed.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match config.file {
        Some(ref path) => {
            let appender = file_appender(path, config.rotation)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| FusionError::Config(format!("failed to install tracing subscriber: {e}")))?;

    if let Some(ref path) = config.file {
        tracing::info!(file = %path.display(), rotation = ?config.rotation, "file logging enabled");
    }
    Ok(guard)
}

fn file_appender(path: &Path, rotation: LogRotation) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .map_or_else(|| DEFAULT_LOG_FILE_NAME.to_owned(), |n| n.to_string_lossy().into_owned());

    let rotation = match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| FusionError::Config(format!("cannot open log file {}: {e}", path.display())))
}
