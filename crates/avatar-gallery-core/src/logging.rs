//! Tracing setup for the embedding application.

use std::io;
use std::path::Path;

use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "warn";

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "avatar-gallery.log";

/// Initialize the tracing subscriber.
///
/// Use the RUST_LOG env var to control the level (e.g. `RUST_LOG=debug`).
/// With `log_dir`, output is also written to a daily-rolling file there; keep
/// the returned guard alive for as long as logs should be flushed. If the log
/// directory is unusable, logging goes to stderr only. Calling this more than
/// once leaves the first subscriber in place.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    let appender = log_dir.map(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
    });

    match appender {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let result = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init();
            if let Err(e) = result {
                debug!(error = %e, "Tracing subscriber already installed");
            }
            Some(guard)
        }
        other => {
            let result = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            if let Err(e) = result {
                debug!(error = %e, "Tracing subscriber already installed");
            }
            if let Some(Err(e)) = other {
                warn!(error = %e, "Failed to open log file, logging to stderr only");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init(Some(dir.path()));
        assert!(guard.is_some());
        assert!(init(None).is_none());
        tracing::warn!("logging initialised");
    }

    #[test]
    fn test_unusable_log_dir_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("log.txt");
        std::fs::write(&not_a_dir, "occupied").unwrap();

        assert!(init(Some(&not_a_dir)).is_none());
    }
}
