//! Log setup: a rotating per-product log file plus an optional console stream.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;

/// Rotated log files kept next to the live one.
const MAX_LOG_FILES: usize = 5;

/// Keeps the non-blocking file writer alive; drop it only at process exit.
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber.
///
/// Logs go to `<log_dir>/<product>.<date>.log`. `RUST_LOG` overrides the
/// default level: `info`, or `debug` when debug dumps are on.
pub fn init(config: &LogConfig, product: &str) -> Result<LogGuard> {
    let appender = file_appender(&config.log_dir, product)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(env_filter(config));

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter(config))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(config)))
}

fn default_directive(config: &LogConfig) -> &'static str {
    if config.debug { "debug" } else { "info" }
}

fn file_appender(log_dir: &Path, product: &str) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(product)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_dumps_lower_default_level() {
        let mut config = LogConfig {
            log_dir: ".".into(),
            console: false,
            debug: false,
        };
        assert_eq!(default_directive(&config), "info");
        config.debug = true;
        assert_eq!(default_directive(&config), "debug");
    }

    #[test]
    fn appender_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs").join("nested");
        let appender = file_appender(&dir, "att-idc-ncs5500");
        assert!(appender.is_ok());
        assert!(dir.is_dir());
    }
}
