//! Shared logging utilities for Horizon binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "horizon_bridge=info,horizon_tape=info";
const QUIET_CONSOLE_FILTER: &str = "warn";
/// Daily files kept before the oldest is pruned
const MAX_LOG_FILES: usize = 5;

/// Logging configuration shared by Horizon binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Directory for the daily log files
    pub log_dir: &'a Path,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
}

/// Initialize tracing with a daily log file and stderr output.
///
/// stdout is left untouched so commands can print machine-readable output.
/// The returned guard flushes the file writer on drop; hold it until exit.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    fs::create_dir_all(config.log_dir).with_context(|| {
        format!(
            "Failed to create logs directory: {}",
            config.log_dir.display()
        )
    })?;
    let file_appender = daily_appender(config.log_dir, config.app_name)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        env_filter.clone()
    } else {
        EnvFilter::new(QUIET_CONSOLE_FILTER)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(env_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// File name prefix used for `app_name`'s logs; files are `<prefix>.<date>.log`.
pub fn log_file_prefix(app_name: &str) -> String {
    app_name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

fn daily_appender(log_dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_file_prefix(app_name))
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))
}
