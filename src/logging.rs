//! Tracing subscriber setup for the binary and for embedding applications.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{AnalysisError, Result};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV: &str = "REPOLENS_LOG";

/// Installs the global subscriber.
///
/// The returned guard flushes the file appender on drop; keep it alive for the
/// lifetime of the process when `config.file` is set.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| AnalysisError::InvalidConfig(format!("invalid log level: {}", e)))?;

    let (file_writer, guard) = match &config.file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let prefix = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "repolens.log".to_string());
            let appender = tracing_appender::rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let registry = Registry::default().with(filter);
    let result = if config.json {
        let stderr = fmt::layer().json().with_target(true).with_writer(std::io::stderr);
        let file = file_writer.map(|writer| fmt::layer().json().with_ansi(false).with_writer(writer));
        registry.with(stderr).with(file).try_init()
    } else {
        let stderr = fmt::layer().with_target(true).with_writer(std::io::stderr);
        let file = file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer));
        registry.with(stderr).with(file).try_init()
    };

    result.map_err(|e| AnalysisError::InvalidConfig(format!("logging already initialized: {}", e)))?;
    Ok(guard)
}
