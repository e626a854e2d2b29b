//! Logging configuration
//!
//! Presets cover the places a journal runs: a developer shell, a test
//! binary, a long-running service writing JSONL files, and the command line
//! tool, which logs to stderr and keeps a few days of files in its data
//! directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How events are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleFormat {
    Off,
    /// Human-readable lines, optionally colored
    Pretty { ansi: bool },
    /// One JSON object per event
    Json,
}

/// JSON event layout, shared by JSON console and file output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFormat {
    /// Put event fields at the top level instead of under `fields`
    pub flatten: bool,
    /// Include the list of entered spans
    pub spans: bool,
    /// Include source file and line
    pub source_location: bool,
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self {
            flatten: true,
            spans: true,
            source_location: true,
        }
    }
}

/// When the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    /// A single file, truncated at startup
    Never,
}

/// JSONL file output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; rolled files get a date suffix
    pub prefix: String,
    pub rotation: LogRotation,
    /// Rolled files kept before the oldest is removed
    pub keep_files: Option<usize>,
}

impl FileConfig {
    /// Daily files named `inkwell.*.log` in `directory`, a week kept
    pub fn in_dir(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "inkwell".to_string(),
            rotation: LogRotation::Daily,
            keep_files: Some(7),
        }
    }

    pub fn with_rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_keep_files(mut self, keep_files: Option<usize>) -> Self {
        self.keep_files = keep_files;
        self
    }
}

/// Complete logging setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives, used unless `RUST_LOG` is set
    pub filter: String,
    pub console: ConsoleFormat,
    pub file: Option<FileConfig>,
    pub json: JsonFormat,
}

impl Default for LogConfig {
    /// JSON lines on stderr at `info`
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            console: ConsoleFormat::Json,
            file: None,
            json: JsonFormat::default(),
        }
    }
}

impl LogConfig {
    /// Colored, verbose console output
    pub fn development() -> Self {
        Self {
            filter: "debug".to_string(),
            console: ConsoleFormat::Pretty { ansi: true },
            ..Default::default()
        }
    }

    /// JSONL files only, kept for a month
    pub fn production(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            console: ConsoleFormat::Off,
            file: Some(FileConfig::in_dir(log_dir).with_keep_files(Some(30))),
            ..Default::default()
        }
    }

    /// Warnings only, uncolored so captured output stays readable
    pub fn testing() -> Self {
        Self {
            filter: "warn".to_string(),
            console: ConsoleFormat::Pretty { ansi: false },
            ..Default::default()
        }
    }

    /// Command line tool: pretty stderr at `filter`, JSONL files under
    /// `data_dir/logs`
    pub fn cli(filter: impl Into<String>, data_dir: &Path) -> Self {
        Self {
            filter: filter.into(),
            console: ConsoleFormat::Pretty { ansi: true },
            file: Some(FileConfig::in_dir(data_dir.join("logs"))),
            ..Default::default()
        }
    }

    /// Drop file output
    pub fn without_file(mut self) -> Self {
        self.file = None;
        self
    }
}
