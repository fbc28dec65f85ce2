//! Error types for Tubesaver core operations.
//!
//! Errors are grouped by domain (`PathError`, `DownloadError`,
//! `FileSystemError`) and wrapped by the top-level [`Error`]. Callers that
//! only need the coarse category use [`Error::kind`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Flat taxonomy of failures, independent of the carried details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The supplied URL is empty or not recognised.
    InvalidUrl,
    /// A required path does not exist.
    PathNotFound,
    /// The process lacks read or write permission on a path.
    PermissionDenied,
    /// An OS-level failure occurred while inspecting a path.
    UnexpectedPathError,
    /// The user declined to continue (e.g. refused an overwrite).
    UserCancelled,
    /// The extraction engine failed.
    ExtractionError,
    /// The history file could not be written.
    HistoryPersistError,
    /// The configuration file could not be loaded.
    ConfigLoadError,
    /// Generic file system failure.
    FileSystem,
    /// Cookie store failure.
    Cookie,
    /// Player process failure.
    Playback,
    /// Anything else.
    Other,
}

/// Path validation errors.
#[derive(Debug, Error)]
pub enum PathError {
    /// Path does not exist.
    #[error("Path does not exist: {path}")]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Missing read or write permission.
    #[error("No {access} permission for: {path}")]
    PermissionDenied {
        /// The path that was checked.
        path: PathBuf,
        /// "read" or "write".
        access: &'static str,
    },

    /// Unexpected failure while validating.
    #[error("Unexpected error validating path '{path}': {reason}")]
    Unexpected {
        /// The path being validated.
        path: PathBuf,
        /// Underlying OS message.
        reason: String,
    },
}

/// Download and extraction errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL rejected before any network call.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The user declined to overwrite an existing file.
    #[error("Download cancelled by user: {path} already exists")]
    UserCancelled {
        /// The conflicting file.
        path: PathBuf,
    },

    /// The user declined the playlist selection prompt.
    #[error("Playlist selection cancelled by user")]
    SelectionCancelled,

    /// The extractor reported a failure.
    #[error("Extraction failed for {url}: {reason}")]
    ExtractionFailed {
        /// URL being extracted.
        url: String,
        /// Message from the extractor.
        reason: String,
    },

    /// The extractor executable could not be started.
    #[error("Failed to start extractor '{program}': {reason}")]
    ExtractorUnavailable {
        /// Program that was spawned.
        program: String,
        /// Spawn error.
        reason: String,
    },
}

/// File system operation errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// File or directory not found.
    #[error("Not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Reading failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Writing failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Directory creation failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Deletion failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Copy failed.
    #[error("Failed to copy {source_path} to {destination}: {reason}")]
    CopyFailed {
        /// Source path.
        source_path: PathBuf,
        /// Destination path.
        destination: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// Errors that can occur in Tubesaver core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Path validation failure.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Download failure.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// File system failure.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The configuration file could not be loaded.
    #[error("Failed to load config {path}: {reason}")]
    ConfigLoad {
        /// Config file path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The history file could not be written.
    #[error("Failed to persist history {path}: {reason}")]
    HistoryPersist {
        /// History file path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Cookie store failure.
    #[error("Cookie error: {0}")]
    Cookie(String),

    /// Player failure.
    #[error("Playback error: {0}")]
    Playback(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Coarse category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Path(PathError::NotFound { .. }) => ErrorKind::PathNotFound,
            Self::Path(PathError::PermissionDenied { .. }) => ErrorKind::PermissionDenied,
            Self::Path(PathError::Unexpected { .. }) => ErrorKind::UnexpectedPathError,
            Self::Download(DownloadError::InvalidUrl { .. }) => ErrorKind::InvalidUrl,
            Self::Download(
                DownloadError::UserCancelled { .. } | DownloadError::SelectionCancelled,
            ) => ErrorKind::UserCancelled,
            Self::Download(
                DownloadError::ExtractionFailed { .. } | DownloadError::ExtractorUnavailable { .. },
            ) => ErrorKind::ExtractionError,
            Self::HistoryPersist { .. } => ErrorKind::HistoryPersistError,
            Self::ConfigLoad { .. } => ErrorKind::ConfigLoadError,
            Self::FileSystem(_) | Self::Io(_) => ErrorKind::FileSystem,
            Self::Cookie(_) => ErrorKind::Cookie,
            Self::Playback(_) => ErrorKind::Playback,
            Self::Configuration(_) | Self::Serialization(_) => ErrorKind::Other,
        }
    }

    /// Whether this error represents a user decision rather than a fault.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self.kind(), ErrorKind::UserCancelled)
    }
}

/// Adds a short context label to errors before they are logged.
pub trait ErrorContext<T> {
    /// Log the error with `context` at `error` level and pass it through.
    fn log_context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn log_context(self, context: &str) -> Self {
        if let Err(ref e) = self {
            if e.is_cancellation() {
                tracing::info!(context, "{e}");
            } else {
                tracing::error!(context, kind = ?e.kind(), "{e}");
            }
        }
        self
    }
}
