//! Tracing setup shared by the kiosk binaries.
//!
//! Logs go to stdout, which systemd forwards to the journal under the unit's
//! `SyslogIdentifier`. Setting `KIOSK_LOG_DIR` adds a daily-rolling file.

use crate::config::{env_flag, DEBUG_LOG_ENV, LOG_DIR_ENV};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. Keep the returned guard alive until exit
/// or buffered file lines are lost.
pub fn init(binary: &str) -> Option<WorkerGuard> {
    let filter = if env_flag(DEBUG_LOG_ENV) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, format!("{}.log", binary));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    guard
}

fn log_dir() -> Option<PathBuf> {
    std::env::var_os(LOG_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
