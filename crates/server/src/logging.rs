//! Logging sink setup.
//!
//! The console sink is always attached and follows the configured level
//! directive. File sinks depend on the build profile: debug builds write an
//! error-only file plus a warning-and-up file, release builds write a single
//! informational file. All files roll daily.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingSettings;

/// Initialize the global subscriber. The returned guards flush the file
/// sinks on drop and must be held for the life of the process.
pub fn init(settings: &LoggingSettings) -> Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter = EnvFilter::try_new(&settings.level)
        .with_context(|| format!("invalid logging level directive '{}'", settings.level))?;
    layers.push(
        fmt::layer()
            .with_target(false)
            .compact()
            .with_filter(console_filter)
            .boxed(),
    );

    if cfg!(debug_assertions) {
        let (errors, guard) = non_blocking(&settings.dir, "error_log", "txt")?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR)
                .boxed(),
        );

        let (warnings, guard) = non_blocking(&settings.dir, "warling_log", "log")?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(warnings)
                .with_filter(LevelFilter::WARN)
                .boxed(),
        );
    } else {
        let (all, guard) = non_blocking(&settings.dir, "log", "txt")?;
        guards.push(guard);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(all)
                .with_filter(LevelFilter::INFO)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).init();

    Ok(guards)
}

fn non_blocking(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .build(dir)
        .with_context(|| format!("failed to open log file {prefix} in {}", dir.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_appender_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let result = non_blocking(&nested, "log", "txt");
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_level_directive_is_rejected() {
        let settings = LoggingSettings {
            level: String::from("no such level!!"),
            dir: tempfile::tempdir().unwrap().path().to_path_buf(),
        };
        assert!(init(&settings).is_err());
    }
}
