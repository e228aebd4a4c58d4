//! Subscriber setup for the `tracing` events emitted across the workspace.
//!
//! The filter comes from `RUST_LOG` and falls back to [`DEFAULT_FILTER`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info";

static LOGGER: OnceCell<LogKind> = OnceCell::new();

/// `LogKind` represents the kind of logging: `stdout` or `logfile`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// It logs to console, the default choice.
    STDOUT,

    /// It logs on a file in <temp dir>/armkit-<timestamp>.log
    FILE,
}

/// Keeps the file writer alive; buffered lines are flushed when dropped.
#[derive(Debug)]
pub struct LoggerGuard {
    path: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

impl LoggerGuard {
    /// The log file, for [`LogKind::FILE`].
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Name of the log file for a logger started now.
#[must_use]
pub fn log_file_name() -> String {
    format!("armkit-{}.log", Utc::now().timestamp())
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Returns `None` when a logger is already
/// installed, by this crate or by someone else.
pub fn init_logger(kind: LogKind) -> Option<LoggerGuard> {
    LOGGER.set(kind).ok()?;
    install(kind)
}

fn install(kind: LogKind) -> Option<LoggerGuard> {
    match kind {
        LogKind::STDOUT => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::stdout)
                .try_init()
                .ok()?;
            Some(LoggerGuard {
                path: None,
                _worker: None,
            })
        }
        LogKind::FILE => {
            let directory = std::env::temp_dir();
            let name = log_file_name();
            let path = directory.join(&name);
            let (writer, worker) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, name));
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(writer)
                .try_init()
                .ok()?;
            Some(LoggerGuard {
                path: Some(path),
                _worker: Some(worker),
            })
        }
    }
}
