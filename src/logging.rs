//! Logging setup with dual output (stdout + log file).
//!
//! The log file is truncated on startup. Lines bound for it go through a
//! non-blocking writer whose worker thread serializes them, so concurrent
//! connections never interleave partial lines.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Build the level filter: `RUST_LOG` wins over the configured level.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber writing to stdout and `log_file`.
///
/// The returned guard flushes the file on drop; keep it alive for the
/// lifetime of the program.
pub fn init(level: &str, log_file: &Path) -> Result<WorkerGuard, LoggingError> {
    let file = File::create(log_file).map_err(|e| LoggingError::Open(log_file.to_path_buf(), e))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stdout)
                .with_filter(filter(level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(filter(level)),
        )
        .try_init()
        .map_err(LoggingError::Install)?;

    Ok(guard)
}

/// Stdout-only logging for the short-lived bootstrap path.
pub fn init_console(level: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(false)
        .finish()
        .try_init()
        .map_err(LoggingError::Install)
}

/// Logging setup errors
#[derive(Debug)]
pub enum LoggingError {
    Open(PathBuf, std::io::Error),
    Install(TryInitError),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoggingError::Open(path, e) => {
                write!(f, "Failed to create log file '{}': {}", path.display(), e)
            }
            LoggingError::Install(e) => write!(f, "Failed to install logger: {}", e),
        }
    }
}

impl std::error::Error for LoggingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unwritable_log_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("log.txt");

        let err = init("info", &path).unwrap_err();
        assert!(matches!(err, LoggingError::Open(..)));
        assert!(err.to_string().contains("log.txt"));
    }

    #[test]
    fn test_file_receives_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let guard = init("info", &path).unwrap();
        tracing::error!(conn_id = 7u64, "Failed to write response");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Failed to write response"));
        assert!(contents.contains("conn_id=7"));
    }
}
