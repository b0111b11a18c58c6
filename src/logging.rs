//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, when possible, to a file as
//! well. `DOCDEX_LOG_FILE` overrides the file location; otherwise `logs/docdex.log`
//! is used. File output runs through a non-blocking writer so slow disks stay off
//! the ingestion path.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the tracing subscribers for the process.
///
/// `RUST_LOG` controls filtering and defaults to `info`. When the log file cannot
/// be opened the process still runs with stdout logging alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact());

    match open_log_file() {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_ansi(false)
                        .compact(),
                )
                .init();
        }
        None => registry.init(),
    }
}

fn open_log_file() -> Option<std::fs::File> {
    let path = match std::env::var("DOCDEX_LOG_FILE") {
        Ok(custom) => PathBuf::from(custom),
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            PathBuf::from("logs").join("docdex.log")
        }
    };

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => Some(file),
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
