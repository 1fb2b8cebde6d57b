//! Diagnostic logging for the `scribe` binary.

use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use audioscribe_core::config::LoggingConfig;
use indicatif::ProgressBar;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Application-specific environment variable for log filtering (overrides config).
pub const LOG_ENV_VAR: &str = "SCRIBE_LOG";

/// Install the global subscriber: stderr always, plus `logging.file` when set.
///
/// Keep the returned guard alive until exit so buffered file output is flushed.
pub fn init(config: &LoggingConfig, console: Console) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(std::env::var(LOG_ENV_VAR).ok().as_deref(), config)?;

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(console))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Stderr writer that hides the active progress bar while a line is written.
#[derive(Clone, Default)]
pub struct Console {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl Console {
    /// Route log lines around `bar` until [`Console::detach`].
    pub fn attach(&self, bar: ProgressBar) {
        *self.slot() = Some(bar);
    }

    pub fn detach(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a> MakeWriter<'a> for Console {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            bar: self.slot().clone(),
        }
    }
}

pub struct ConsoleWriter {
    bar: Option<ProgressBar>,
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.bar {
            Some(bar) => bar.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// `SCRIBE_LOG` wins over the configured level when it is set and non-empty.
fn build_filter(env_directives: Option<&str>, config: &LoggingConfig) -> Result<EnvFilter> {
    match env_directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid {LOG_ENV_VAR} value: {directives}")),
        None => EnvFilter::try_new(config.level.as_filter())
            .context("Invalid log level directive"),
    }
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use audioscribe_core::config::LogLevel;

    #[test]
    fn test_filter_falls_back_to_config_level() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            file: None,
        };
        let filter = build_filter(None, &config).unwrap();
        assert!(filter.to_string().contains("audioscribe_core=debug"));
    }

    #[test]
    fn test_blank_env_value_is_ignored() {
        let filter = build_filter(Some("  "), &LoggingConfig::default()).unwrap();
        assert!(filter.to_string().contains("audioscribe_core=info"));
    }

    #[test]
    fn test_env_value_overrides_config() {
        let filter = build_filter(Some("warn"), &LoggingConfig::default()).unwrap();
        assert!(!filter.to_string().contains("audioscribe_core"));
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let err = build_filter(Some("scribe=loud"), &LoggingConfig::default()).unwrap_err();
        assert!(err.to_string().contains(LOG_ENV_VAR));
    }

    #[test]
    fn test_console_writes_around_attached_bar() {
        let console = Console::default();
        assert!(console.make_writer().bar.is_none());

        console.attach(ProgressBar::hidden());
        let mut writer = console.make_writer();
        assert!(writer.bar.is_some());
        assert_eq!(writer.write(b"").unwrap(), 0);

        console.detach();
        assert!(console.make_writer().bar.is_none());
    }

    #[test]
    fn test_file_writer_creates_missing_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("scribe.log");

        let (_writer, _guard) = file_writer(&path).unwrap();

        assert!(dir.path().join("logs").is_dir());
    }
}
