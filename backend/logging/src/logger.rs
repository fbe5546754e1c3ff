//! Structured Logger
//!
//! Wraps `tracing` with a console layer, a JSON file layer rotated daily
//! (`exitrack.log.YYYY-MM-DD`) and `RUST_LOG` level control.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "exitrack.log";

/// Initialize the global logger. `RUST_LOG` wins over `level`.
///
/// Only the first call installs a subscriber; later calls are no-ops and
/// return `Ok(false)`.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<bool> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    Ok(installed)
}
