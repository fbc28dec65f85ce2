//! `Tubesaver` Core Library
//!
//! This crate provides the core functionality for the `tubesaver` command-line
//! downloader:
//! - Download orchestration (validation, conflict checks, extraction, cleanup)
//! - A deduplicated, size-bounded history of downloads and playback
//! - Application configuration management
//! - Cookie storage and session validity probes
//! - Local and online playback helpers
//! - A bounded worker pool for batch downloads
//!
//! # Error Handling
//!
//! This crate uses typed errors for each domain. See the [`error`] module for
//! details.
//!
//! ```rust,ignore
//! use tubesaver_core::{DownloadOrchestrator, DownloadRequest, HistoryStore, YtDlpExtractor};
//!
//! let orchestrator = DownloadOrchestrator::new(config, Arc::new(YtDlpExtractor::new()), history);
//! let report = orchestrator.execute(&DownloadRequest::audio("https://youtu.be/abc"), None);
//! println!("{}", report.message());
//! ```

pub mod artifact;
pub mod cleanup;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod fs;
pub mod history;
pub mod notify;
pub mod options;
pub mod orchestrator;
pub mod paths;
pub mod playback;
pub mod queue;

pub use artifact::{
    ArtifactResolver, AUDIO_FALLBACK_EXTENSIONS, VIDEO_FALLBACK_EXTENSIONS, candidate_extensions,
};
pub use cleanup::{CleanupReport, TempCleaner};
pub use config::{
    AUDIO_FORMATS, AUDIO_QUALITIES, AppConfig, AppPaths, ConfigManager, MAX_CONCURRENT_DOWNLOADS,
    MIN_CONCURRENT_DOWNLOADS, THEME_COLORS, VIDEO_FORMATS, VIDEO_QUALITIES,
};
pub use cookies::{
    Cookie, CookieExpiry, CookieStatus, CookieStore, CookieValidator, HttpCookieValidator, Site,
};
pub use error::{
    DownloadError, Error, ErrorContext, ErrorKind, FileSystemError, PathError, Result,
};
pub use extractor::{
    Extractor, FetchedMedia, MediaInfo, PlaylistEntry, ProgressCallback, ProgressEvent,
    YtDlpExtractor,
};
pub use fs::{FileSystem, RealFileSystem};
pub use history::{
    HISTORY_FILE_NAME, HistoryKey, HistoryRecord, HistoryStore, MAX_HISTORY_ENTRIES,
};
pub use notify::{Notifier, SilentNotifier, SoundNotifier};
pub use options::{ExtractionOptions, FormatSpec, MediaKind, OutputTarget};
pub use orchestrator::{
    Command, CommandReport, DownloadOrchestrator, DownloadReport, DownloadRequest, DownloadState,
    ExtractionOutcome, NonInteractive, PlaybackReport, PlaylistChoice, Prompt, is_playlist_url,
    is_tiktok_url, is_valid_url, selector_from_indices,
};
pub use paths::{PathValidator, expand_user};
pub use playback::{AudioLibrary, MpvRunner, PlaybackRunner, PlayerExit, find_program};
pub use queue::{DownloadQueue, QueueEvent, QueueItem, QueueItemId, QueueItemStatus, QueueStats};
