//! Structured logging using tracing.
//!
//! Provides:
//! - Development and production presets
//! - Human-readable console output on stderr, filtered by `RUST_LOG`
//! - JSON file output under `<base_dir>/logs`, rotated with bounded retention
//!
//! A log directory that cannot be created is not fatal: the reason is printed
//! to stderr and only the console layer is installed.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Crates whose events pass the default filters.
const OWN_TARGETS: &[&str] = &["tubesaver", "tubesaver_core"];

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files are stored.
    pub log_directory: PathBuf,
    /// Log file name prefix ("tubesaver" -> "tubesaver.2026-01-15.log").
    pub log_file_prefix: String,
    /// Maximum level of our own events on the console.
    pub console_level: Level,
    /// Maximum level of our own events in the log file.
    pub file_level: Level,
    /// How often to rotate log files.
    pub rotation: LogRotation,
    /// Number of rotated files to keep (0 = keep forever).
    pub max_log_files: usize,
    /// Whether to include ANSI color codes in console output.
    pub console_ansi: bool,
    /// Whether to include file/line info in console output.
    pub include_file_line: bool,
    /// Whether to include the target module in console output.
    pub include_target: bool,
    /// Whether to log span events (enter/exit).
    pub log_span_events: bool,
}

/// Log rotation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    /// Create a new log file every hour.
    Hourly,
    /// Create a new log file every day.
    Daily,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Self::HOURLY,
            LogRotation::Daily => Self::DAILY,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::production(PathBuf::from("logs"))
    }
}

impl LoggingConfig {
    /// Verbose console and file logging.
    #[must_use]
    pub fn development(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            log_file_prefix: "tubesaver".to_string(),
            console_level: Level::DEBUG,
            file_level: Level::TRACE,
            rotation: LogRotation::Hourly,
            max_log_files: 24,
            console_ansi: true,
            include_file_line: true,
            include_target: true,
            log_span_events: true,
        }
    }

    /// Quiet console (warnings and errors only) so progress bars stay
    /// readable; the file keeps debug detail.
    #[must_use]
    pub fn production(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            log_file_prefix: "tubesaver".to_string(),
            console_level: Level::WARN,
            file_level: Level::DEBUG,
            rotation: LogRotation::Daily,
            max_log_files: 7,
            console_ansi: true,
            include_file_line: false,
            include_target: false,
            log_span_events: false,
        }
    }

    /// Pick a preset from the `--verbose` flag.
    #[must_use]
    pub fn for_verbosity(log_directory: PathBuf, verbose: bool) -> Self {
        if verbose {
            Self::development(log_directory)
        } else {
            Self::production(log_directory)
        }
    }
}

/// Keeps file logging active. Drop this to flush and close log files.
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create the log directory.
    #[error("Failed to create log directory {path}: {reason}")]
    DirectoryCreationFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// The rolling appender could not be built.
    #[error("Failed to open log file in {path}: {reason}")]
    AppenderFailed {
        /// The log directory.
        path: PathBuf,
        /// The reason for the failure.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Create the log directory and a rolling appender inside it.
pub fn open_appender(config: &LoggingConfig) -> Result<RollingFileAppender, LoggingError> {
    ensure_directory(&config.log_directory)?;
    RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.log_file_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_log_files.max(1))
        .build(&config.log_directory)
        .map_err(|e| LoggingError::AppenderFailed {
            path: config.log_directory.clone(),
            reason: e.to_string(),
        })
}

fn ensure_directory(path: &Path) -> Result<(), LoggingError> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Filter directive: warnings from dependencies, `level` for our crates.
fn directives(level: Level) -> String {
    let level = level_to_directive(level);
    std::iter::once("warn".to_string())
        .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
///
/// Returns a guard that must be kept alive for the duration of the program.
/// When the guard is dropped, pending file entries are flushed to disk.
///
/// # Errors
///
/// Returns [`LoggingError::AlreadyInitialized`] if a subscriber is already
/// installed. Log directory failures are reported on stderr instead.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let file = match open_appender(config) {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!("Warning: {e}; logging to console only");
            None
        }
    };
    let (file_writer, file_guard) = file.unzip();

    // RUST_LOG overrides the console filter only
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(config.console_level)));
    let file_filter = EnvFilter::new(directives(config.file_level));

    let span_events = if config.log_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.console_ansi)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events.clone())
        .with_filter(console_filter);

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .json()
            .with_filter(file_filter)
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Convert a tracing Level to a filter directive string.
const fn level_to_directive(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}
