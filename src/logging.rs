//! Tracing subscriber setup for the binary.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub const DEFAULT_LEVEL: &str = "info";
pub const LOG_FILE_PREFIX: &str = "sigtrader.log";

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Installs the global subscriber: human-readable events on stderr, plus a
/// daily rolling file under `dir` when given. Keep the returned guard alive
/// until exit so buffered file output is flushed. Installing twice is a no-op.
pub fn init(level: Option<&str>, dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter(level));

    match dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter(level));
            let _ = Registry::default()
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = Registry::default().with(stderr_layer).try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_level_falls_back_to_default() {
        let filter = env_filter(Some("not a level=="));
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn init_twice_does_not_panic() {
        let dir = tempfile::TempDir::new().unwrap();
        let guard = init(Some("debug"), Some(dir.path()));
        assert!(guard.is_some());
        tracing::info!("logging initialised");
        assert!(init(None, None).is_none());
    }
}
