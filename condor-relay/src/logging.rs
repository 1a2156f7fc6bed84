//! Logging setup
//!
//! Console output always; a rolling log file when the configuration asks for
//! one. `RUST_LOG` overrides the configured level.

use crate::config::LogSettings;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive; dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(io::stdout);

    let (file_layer, file_guard) = match settings.log_file_path.as_deref() {
        Some(path) if settings.log_to_file => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(
                path,
                settings.max_log_files,
            )?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(path) = settings.log_file_path.as_ref().filter(|_| settings.log_to_file) {
        tracing::info!("Logging to file: {}", path.display());
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Daily-rotating appender writing `path`, keeping `max_files` old files
fn file_appender(path: &Path, max_files: usize) -> anyhow::Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("condor-relay.log");

    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_files.max(1))
        .build(dir)?;
    Ok(appender)
}
