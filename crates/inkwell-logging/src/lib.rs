//! Structured logging for Inkwell
//!
//! One subscriber is installed per process. It combines an `EnvFilter`
//! (`RUST_LOG` wins over the configured filter), optional stderr output in
//! pretty or JSON form, optional JSONL files rolled by `tracing-appender`,
//! and [`DeviceContextLayer`], which tags spans with the device whose
//! journal is doing the work.
//!
//! ```ignore
//! use inkwell_logging::{DeviceContextGuard, InkwellSubscriberBuilder, LogConfig};
//!
//! let _log_guard = InkwellSubscriberBuilder::new()
//!     .with_config(LogConfig::cli("warn", &data_dir))
//!     .init();
//!
//! let _device = DeviceContextGuard::new(&journal.stream_id());
//! tracing::info!("Syncing");
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, JsonFormat, LogConfig, LogRotation};
pub use context::{DeviceContextData, DeviceContextGuard};
pub use layers::{DeviceContextExtension, DeviceContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to open log file: {0}")]
    File(String),

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Builds and installs the process-wide subscriber
#[derive(Debug, Default)]
pub struct InkwellSubscriberBuilder {
    config: LogConfig,
}

impl InkwellSubscriberBuilder {
    /// Start from [`LogConfig::default`]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the filter directives
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = filter.into();
        self
    }

    pub fn with_console(mut self, console: ConsoleFormat) -> Self {
        self.config.console = console;
        self
    }

    /// Also write JSONL files
    pub fn with_file_output(mut self, file: FileConfig) -> Self {
        self.config.file = Some(file);
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LogError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.config.filter).map_err(|e| LogError::Filter {
            filter: self.config.filter.clone(),
            reason: e.to_string(),
        })
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output when dropped; keep it alive
    /// until the program exits.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = self.env_filter()?;
        let json = self.config.json;

        let pretty_console = match self.config.console {
            ConsoleFormat::Pretty { ansi } => Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(ansi)
                    .with_target(true),
            ),
            _ => None,
        };

        let json_console = (self.config.console == ConsoleFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(json.spans)
                .flatten_event(json.flatten)
                .with_file(json.source_location)
                .with_line_number(json.source_location)
        });

        let (file_layer, guard) = match &self.config.file {
            Some(file) => {
                let (writer, guard) = file_writer(file)?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_span_list(json.spans)
                    .flatten_event(json.flatten)
                    .with_file(json.source_location)
                    .with_line_number(json.source_location);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(DeviceContextLayer::new())
            .with(pretty_console)
            .with(json_console)
            .with(file_layer)
            .try_init()
            .map_err(|_| LogError::AlreadyInitialized)?;

        Ok(guard)
    }

    /// Install the subscriber, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }
}

/// Non-blocking writer for `file`
///
/// `Never` truncates a single `<prefix>.log`; the other rotations append to
/// dated files and prune beyond `keep_files`.
fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&file.directory).map_err(|e| LogError::File(e.to_string()))?;

    let rotation = match file.rotation {
        LogRotation::Never => {
            let path = file.directory.join(format!("{}.log", file.prefix));
            let handle = File::create(&path).map_err(|e| LogError::File(e.to_string()))?;
            return Ok(tracing_appender::non_blocking(handle));
        }
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file.prefix)
        .filename_suffix("log");
    if let Some(keep) = file.keep_files {
        builder = builder.max_log_files(keep);
    }
    let appender = builder
        .build(&file.directory)
        .map_err(|e| LogError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Warnings on stderr for test binaries; repeated calls are ignored
pub fn init_testing() {
    let _ = InkwellSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_overrides() {
        let builder = InkwellSubscriberBuilder::new()
            .with_filter("inkwell_storage=trace")
            .with_console(ConsoleFormat::Off)
            .with_file_output(FileConfig::in_dir("/tmp/inkwell-logs"));

        assert_eq!(builder.config.filter, "inkwell_storage=trace");
        assert_eq!(builder.config.console, ConsoleFormat::Off);
        assert!(builder.config.file.is_some());
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        // RUST_LOG bypasses the configured filter
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = InkwellSubscriberBuilder::new()
            .with_filter("inkwell=loud")
            .try_init()
            .unwrap_err();
        assert!(matches!(err, LogError::Filter { .. }));
    }

    #[test]
    fn test_single_file_writer() {
        let temp = TempDir::new().unwrap();
        let file = FileConfig::in_dir(temp.path().join("logs")).with_rotation(LogRotation::Never);

        let (_writer, _guard) = file_writer(&file).unwrap();
        assert!(temp.path().join("logs").join("inkwell.log").exists());
    }

    #[test]
    fn test_rolling_file_writer() {
        let temp = TempDir::new().unwrap();
        let file = FileConfig::in_dir(temp.path())
            .with_rotation(LogRotation::Hourly)
            .with_keep_files(Some(2));

        assert!(file_writer(&file).is_ok());
    }
}
