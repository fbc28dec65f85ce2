//! End-to-end execution of one download request.
//!
//! [`DownloadOrchestrator::execute`] walks a request through
//! `Idle -> UrlValidated -> PathValidated -> ConflictChecked -> Extracting ->
//! Cleaning -> Recorded`, leaving for `Failed` at the first error. Every
//! failure is folded into a [`DownloadReport`]; nothing escapes as an `Err`.
//!
//! Temporary artifacts are only swept after a successful fetch. A failed
//! fetch leaves its partial files in place so they can be inspected or
//! resumed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactResolver;
use crate::cleanup::{CleanupReport, TempCleaner};
use crate::config::AppConfig;
use crate::cookies::{CookieStatus, CookieStore, CookieValidator, Site};
use crate::error::{DownloadError, Error, ErrorContext, ErrorKind, Result};
use crate::extractor::{Extractor, FetchedMedia, MediaInfo, PlaylistEntry, ProgressCallback};
use crate::fs::FileSystem;
use crate::history::HistoryStore;
use crate::notify::{Notifier, SilentNotifier};
use crate::options::{ExtractionOptions, FormatSpec, MediaKind, OutputTarget};
use crate::paths::PathValidator;
use crate::playback::{MpvRunner, PlaybackRunner, PlayerExit};

/// Hosts accepted without an explicit scheme.
const KNOWN_HOST_MARKERS: &[&str] = &["youtube.com", "youtu.be"];

/// Whether `url` looks like something the extractor can handle.
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty()
        && (KNOWN_HOST_MARKERS.iter().any(|host| url.contains(host)) || url.starts_with("http"))
}

/// Whether `url` refers to a playlist.
#[must_use]
pub fn is_playlist_url(url: &str) -> bool {
    url.to_lowercase().contains("playlist")
}

/// Whether `url` points at TikTok.
#[must_use]
pub fn is_tiktok_url(url: &str) -> bool {
    url.to_lowercase().contains("tiktok.com")
}

/// Join 1-based playlist indices into a selector such as `1,3,5`.
#[must_use]
pub fn selector_from_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// States of a single download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadState {
    /// Nothing checked yet.
    Idle,
    /// URL accepted.
    UrlValidated,
    /// Output directory exists and is writable.
    PathValidated,
    /// No conflicting file, or the user agreed to overwrite it.
    ConflictChecked,
    /// Extractor running.
    Extracting,
    /// Post-download sweep of temporary files.
    Cleaning,
    /// History updated and completion announced.
    Recorded,
    /// Terminal failure or cancellation.
    Failed,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::UrlValidated => "url-validated",
            Self::PathValidated => "path-validated",
            Self::ConflictChecked => "conflict-checked",
            Self::Extracting => "extracting",
            Self::Cleaning => "cleaning",
            Self::Recorded => "recorded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One user-initiated download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Playlist item selector, e.g. `1,3,5-7`.
    pub playlist_items: Option<String>,
}

impl DownloadRequest {
    /// Request `url` as `media_kind`.
    pub fn new(url: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            media_kind,
            playlist_items: None,
        }
    }

    /// Audio request.
    pub fn audio(url: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Audio)
    }

    /// Video request.
    pub fn video(url: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Video)
    }

    /// Restrict a playlist request to `selector`.
    #[must_use]
    pub fn with_playlist_items(mut self, selector: Option<String>) -> Self {
        self.playlist_items = selector;
        self
    }
}

/// Success flag, title and error message of a finished request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Whether the request reached `Recorded`.
    pub success: bool,
    /// Resolved title, or the URL when none was known.
    pub title: String,
    /// Failure message.
    pub error: Option<String>,
}

/// Everything that happened to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadReport {
    /// The request as submitted.
    pub request: DownloadRequest,
    /// States visited, in order.
    pub states: Vec<DownloadState>,
    /// Final outcome.
    pub outcome: ExtractionOutcome,
    /// Failure category, `None` on success.
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
    /// Final files reported by the extractor.
    pub outputs: Vec<PathBuf>,
    /// Non-fatal problems (cookie warnings, history write failures).
    pub warnings: Vec<String>,
    /// Result of the temporary-file sweep, if it ran.
    pub cleanup: Option<CleanupReport>,
}

impl DownloadReport {
    fn new(request: DownloadRequest) -> Self {
        let title = request.url.clone();
        Self {
            request,
            states: vec![DownloadState::Idle],
            outcome: ExtractionOutcome {
                success: false,
                title,
                error: None,
            },
            error_kind: None,
            outputs: Vec::new(),
            warnings: Vec::new(),
            cleanup: None,
        }
    }

    fn enter(&mut self, state: DownloadState) {
        debug!("{} -> {}", self.final_state(), state);
        self.states.push(state);
    }

    fn warn(&mut self, message: String) {
        warn!(context = self.request.media_kind.context(), "{}", message);
        self.warnings.push(message);
    }

    /// The last state reached.
    #[must_use]
    pub fn final_state(&self) -> DownloadState {
        self.states.last().copied().unwrap_or(DownloadState::Idle)
    }

    /// Whether the request completed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.success
    }

    /// Whether the user stopped the request before extraction.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.error_kind == Some(ErrorKind::UserCancelled)
    }

    /// Whether `state` was visited.
    #[must_use]
    pub fn visited(&self, state: DownloadState) -> bool {
        self.states.contains(&state)
    }

    /// Terminal status line.
    #[must_use]
    pub fn message(&self) -> String {
        if self.outcome.success {
            return format!("Downloaded: {}", self.outcome.title);
        }
        let reason = self.outcome.error.as_deref().unwrap_or("unknown error");
        if self.is_cancelled() {
            format!("Download cancelled: {reason}")
        } else {
            format!("Download failed: {reason}")
        }
    }
}

/// How much of a playlist to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistChoice {
    /// Every entry.
    All,
    /// Entries matching a selector such as `1,3,5-7`.
    Items(String),
    /// Stop without downloading.
    Cancel,
}

/// Questions the orchestrator needs answered by the user.
#[cfg_attr(test, mockall::automock)]
pub trait Prompt: Send + Sync {
    /// Whether to overwrite `existing`.
    fn confirm_overwrite(&self, existing: &Path) -> bool;

    /// Which entries of the playlist at `url` to fetch.
    fn playlist_selection(&self, url: &str, entries: &[PlaylistEntry]) -> PlaylistChoice;
}

/// Answers without asking: never overwrites, always takes whole playlists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl Prompt for NonInteractive {
    fn confirm_overwrite(&self, existing: &Path) -> bool {
        info!("Skipping existing file {}", existing.display());
        false
    }

    fn playlist_selection(&self, _url: &str, _entries: &[PlaylistEntry]) -> PlaylistChoice {
        PlaylistChoice::All
    }
}

/// Entry-point commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Download audio.
    DownloadAudio {
        /// Source URL.
        url: String,
        /// Optional playlist selector.
        playlist_items: Option<String>,
    },
    /// Download video.
    DownloadVideo {
        /// Source URL.
        url: String,
        /// Optional playlist selector.
        playlist_items: Option<String>,
    },
    /// Stream a URL in the player.
    PlayOnline {
        /// Source URL.
        url: String,
    },
}

/// Outcome of an online playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Played URL.
    pub url: String,
    /// Title recorded in history.
    pub title: String,
    /// Player exit status, if it ran.
    pub exit: Option<PlayerExit>,
    /// Failure message.
    pub error: Option<String>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

impl PlaybackReport {
    /// Whether the player ran and exited cleanly.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.exit.is_some_and(|exit| exit.success())
    }

    /// Terminal status line.
    #[must_use]
    pub fn message(&self) -> String {
        match (&self.error, self.exit) {
            (Some(error), _) => format!("Playback failed: {error}"),
            (None, Some(exit)) if !exit.success() => {
                format!("Player exited with status {:?}: {}", exit.code, self.title)
            }
            _ => format!("Played: {}", self.title),
        }
    }
}

/// Result of [`DownloadOrchestrator::dispatch`].
#[derive(Debug, Clone)]
pub enum CommandReport {
    /// A download ran.
    Download(DownloadReport),
    /// A playback ran.
    Playback(PlaybackReport),
}

impl CommandReport {
    /// Whether the command succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::Download(report) => report.is_success(),
            Self::Playback(report) => report.is_success(),
        }
    }

    /// Terminal status line.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Download(report) => report.message(),
            Self::Playback(report) => report.message(),
        }
    }
}

/// Composes validation, conflict detection, extraction, cleanup and history.
pub struct DownloadOrchestrator {
    config: Arc<AppConfig>,
    extractor: Arc<dyn Extractor>,
    history: Arc<HistoryStore>,
    prompt: Arc<dyn Prompt>,
    notifier: Arc<dyn Notifier>,
    player: Arc<dyn PlaybackRunner>,
    validator: PathValidator,
    resolver: ArtifactResolver,
    cleaner: TempCleaner,
    cookie_file: Option<PathBuf>,
    cookie_check: Option<(Arc<CookieStore>, Arc<dyn CookieValidator>)>,
}

impl fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .field("history", &self.history)
            .field("cookie_file", &self.cookie_file)
            .finish_non_exhaustive()
    }
}

impl DownloadOrchestrator {
    /// Orchestrator over the real file system with a non-interactive prompt,
    /// no notifications and `mpv` for playback.
    pub fn new(
        config: Arc<AppConfig>,
        extractor: Arc<dyn Extractor>,
        history: Arc<HistoryStore>,
    ) -> Self {
        Self {
            config,
            extractor,
            history,
            prompt: Arc::new(NonInteractive),
            notifier: Arc::new(SilentNotifier),
            player: Arc::new(MpvRunner::default()),
            validator: PathValidator::default(),
            resolver: ArtifactResolver::default(),
            cleaner: TempCleaner::default(),
            cookie_file: None,
            cookie_check: None,
        }
    }

    /// Ask the user through `prompt`.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Announce completions through `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Play online media through `player`.
    #[must_use]
    pub fn with_player(mut self, player: Arc<dyn PlaybackRunner>) -> Self {
        self.player = player;
        self
    }

    /// Run path checks, conflict probes and cleanup against `fs`.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.validator = PathValidator::new(Arc::clone(&fs));
        self.resolver = ArtifactResolver::new(Arc::clone(&fs));
        self.cleaner = TempCleaner::new(fs);
        self
    }

    /// Hand `cookie_file` to the extractor.
    #[must_use]
    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    /// Check TikTok sessions in `store` with `validator` before TikTok downloads.
    #[must_use]
    pub fn with_cookie_check(
        mut self,
        store: Arc<CookieStore>,
        validator: Arc<dyn CookieValidator>,
    ) -> Self {
        self.cookie_check = Some((store, validator));
        self
    }

    /// The configuration snapshot in use.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run a command.
    pub fn dispatch(
        &self,
        command: Command,
        progress: Option<ProgressCallback>,
    ) -> CommandReport {
        match command {
            Command::DownloadAudio {
                url,
                playlist_items,
            } => CommandReport::Download(self.execute(
                &DownloadRequest::audio(url).with_playlist_items(playlist_items),
                progress,
            )),
            Command::DownloadVideo {
                url,
                playlist_items,
            } => CommandReport::Download(self.execute(
                &DownloadRequest::video(url).with_playlist_items(playlist_items),
                progress,
            )),
            Command::PlayOnline { url } => CommandReport::Playback(self.play_online(&url)),
        }
    }

    /// Execute `request` end to end.
    pub fn execute(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressCallback>,
    ) -> DownloadReport {
        let context = request.media_kind.context();
        let mut report = DownloadReport::new(request.clone());

        match self.run(request, &mut report, progress).log_context(context) {
            Ok(()) => {
                report.outcome.success = true;
                info!(context, "Download complete: {}", report.outcome.title);
            }
            Err(e) => {
                report.enter(DownloadState::Failed);
                report.error_kind = Some(e.kind());
                report.outcome.error = Some(e.to_string());
            }
        }
        report
    }

    fn run(
        &self,
        request: &DownloadRequest,
        report: &mut DownloadReport,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let url = request.url.trim();
        let kind = request.media_kind;
        let context = kind.context();

        if !is_valid_url(url) {
            return Err(DownloadError::InvalidUrl {
                url: request.url.clone(),
                reason: "expected a YouTube link or an http(s) URL".to_string(),
            }
            .into());
        }
        report.enter(DownloadState::UrlValidated);

        if is_tiktok_url(url) {
            self.check_tiktok_session(report);
        }

        let mut target = OutputTarget::for_kind(kind, &self.config);
        target.base_directory = self.validator.validate(&target.base_directory, true, true)?;
        report.enter(DownloadState::PathValidated);

        let info = self.probe(url, context);
        let title = info
            .as_ref()
            .map_or_else(|| url.to_string(), |info| info.title.clone());
        report.outcome.title.clone_from(&title);

        let format = FormatSpec::for_kind(kind, &self.config);
        let conflict_dir = target.conflict_directory();
        let mut overwrite = false;
        if let Some(existing) =
            self.resolver
                .find_existing(&conflict_dir, &title, &format.conflict_extensions(kind))
        {
            if !self.prompt.confirm_overwrite(&existing) {
                return Err(DownloadError::UserCancelled { path: existing }.into());
            }
            info!(context, "Overwriting {}", existing.display());
            overwrite = true;
        }
        report.enter(DownloadState::ConflictChecked);

        let selector = match &request.playlist_items {
            Some(items) => Some(items.clone()),
            None if is_playlist_url(url) => {
                let entries = info.as_ref().map_or(&[][..], |info| info.entries.as_slice());
                match self.prompt.playlist_selection(url, entries) {
                    PlaylistChoice::All => None,
                    PlaylistChoice::Items(items) => Some(items),
                    PlaylistChoice::Cancel => return Err(DownloadError::SelectionCancelled.into()),
                }
            }
            None => None,
        };

        let options = ExtractionOptions::new(kind, &self.config, &target)
            .with_playlist_items(selector)
            .with_cookie_file(self.cookie_file.clone())
            .with_overwrite(overwrite);
        report.enter(DownloadState::Extracting);
        info!(context, "Downloading {} as {}", url, kind);
        let fetched = self.extractor.fetch(url, &options, progress)?;

        let is_playlist = info.as_ref().is_some_and(MediaInfo::is_playlist);
        if !is_playlist && !fetched.title.is_empty() {
            report.outcome.title.clone_from(&fetched.title);
        }
        report.outputs.clone_from(&fetched.outputs);

        report.enter(DownloadState::Cleaning);
        if self.config.auto_delete_temp {
            let cleanup = self.sweep(&fetched, &conflict_dir, &report.outcome.title);
            if !cleanup.deleted.is_empty() || !cleanup.is_success() {
                info!(context, "{}", cleanup.summary());
            }
            report.cleanup = Some(cleanup);
        }

        let title = report.outcome.title.clone();
        if let Err(e) = self.history.record(&title, url) {
            report.warn(format!("History not updated: {e}"));
        }
        self.notifier.notify(&title);
        report.enter(DownloadState::Recorded);
        Ok(())
    }

    fn check_tiktok_session(&self, report: &mut DownloadReport) {
        let Some((store, validator)) = &self.cookie_check else {
            return;
        };
        match store.status(Site::TikTok, validator.as_ref()) {
            CookieStatus::Valid => debug!("TikTok cookies are valid"),
            status => report.warn(format!(
                "TikTok cookies are {status}; private videos may fail to download"
            )),
        }
    }

    /// Metadata probe; failures fall back to the URL as title.
    fn probe(&self, url: &str, context: &str) -> Option<MediaInfo> {
        match self.extractor.probe(url) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(context, "Could not resolve title of {}, using the URL: {}", url, e);
                None
            }
        }
    }

    /// Sweep leftovers next to each output, or in `fallback_dir` when the
    /// extractor reported no paths.
    fn sweep(&self, fetched: &FetchedMedia, fallback_dir: &Path, title: &str) -> CleanupReport {
        if fetched.outputs.is_empty() {
            return self.cleaner.cleanup(fallback_dir, title);
        }

        let mut combined = CleanupReport::default();
        for output in &fetched.outputs {
            let (Some(dir), Some(stem)) = (output.parent(), output.file_stem()) else {
                continue;
            };
            let stem = stem.to_string_lossy();
            let part = match output.extension() {
                Some(ext) => self.cleaner.cleanup_preserving(dir, &stem, &ext.to_string_lossy()),
                None => self.cleaner.cleanup(dir, &stem),
            };
            combined.deleted.extend(part.deleted);
            combined.failed.extend(part.failed);
        }
        combined
    }

    /// Entries of the playlist at `url`.
    pub fn list_playlist(&self, url: &str) -> Result<Vec<PlaylistEntry>> {
        if !is_valid_url(url) {
            return Err(DownloadError::InvalidUrl {
                url: url.to_string(),
                reason: "expected a YouTube link or an http(s) URL".to_string(),
            }
            .into());
        }
        let info = self
            .extractor
            .probe(url.trim())
            .log_context("DownloadPlaylist")?;
        Ok(info.entries)
    }

    /// Record `url` in history and play it, blocking until the player exits.
    pub fn play_online(&self, url: &str) -> PlaybackReport {
        let url = url.trim();
        let mut report = PlaybackReport {
            url: url.to_string(),
            title: url.to_string(),
            exit: None,
            error: None,
            warnings: Vec::new(),
        };

        match self.run_playback(url, &mut report).log_context("PlayOnline") {
            Ok(exit) => report.exit = Some(exit),
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }

    fn run_playback(&self, url: &str, report: &mut PlaybackReport) -> Result<PlayerExit> {
        if !is_valid_url(url) {
            return Err(DownloadError::InvalidUrl {
                url: url.to_string(),
                reason: "expected a YouTube link or an http(s) URL".to_string(),
            }
            .into());
        }
        if !self.player.is_available() {
            return Err(Error::Playback("no media player found, install mpv".to_string()));
        }

        if let Some(info) = self.probe(url, "PlayOnline") {
            report.title = info.title;
        }
        if let Err(e) = self.history.record(&report.title, url) {
            let message = format!("History not updated: {e}");
            warn!(context = "PlayOnline", "{}", message);
            report.warnings.push(message);
        }
        self.player.play(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::extractor::MockExtractor;
    use crate::fs::mock::MockFileSystem;
    use crate::notify::MockNotifier;
    use crate::playback::MockPlaybackRunner;
    use tempfile::TempDir;

    const URL: &str = "https://youtu.be/abc";

    fn config_for(dir: &Path) -> AppConfig {
        AppConfig {
            audio_path: dir.to_path_buf(),
            video_path: dir.to_path_buf(),
            create_subfolders: false,
            ..AppConfig::default()
        }
    }

    fn single(title: &str) -> MediaInfo {
        MediaInfo {
            id: "abc".to_string(),
            title: title.to_string(),
            entries: Vec::new(),
        }
    }

    fn orchestrator(
        dir: &Path,
        extractor: MockExtractor,
        prompt: MockPrompt,
    ) -> (DownloadOrchestrator, Arc<HistoryStore>) {
        let history = Arc::new(HistoryStore::open(dir.join("history_online.json")));
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(config_for(dir)),
            Arc::new(extractor),
            Arc::clone(&history),
        )
        .with_prompt(Arc::new(prompt));
        (orchestrator, history)
    }

    #[test]
    fn test_scenario_a_records_new_download() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let output = dir.join("Song Title.mp3");

        let mut extractor = MockExtractor::new();
        extractor
            .expect_probe()
            .returning(|_| Ok(single("Song Title")));
        let fetched_output = output.clone();
        extractor.expect_fetch().times(1).returning(move |_, options, _| {
            assert_eq!(options.media_kind, MediaKind::Audio);
            assert!(!options.overwrite);
            std::fs::write(&fetched_output, "mp3").unwrap();
            Ok(FetchedMedia {
                id: "abc".to_string(),
                title: "Song Title".to_string(),
                outputs: vec![fetched_output.clone()],
            })
        });
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm_overwrite().never();

        let (orchestrator, history) = orchestrator(&dir, extractor, prompt);
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);

        assert!(report.is_success(), "{}", report.message());
        assert_eq!(
            report.states,
            vec![
                DownloadState::Idle,
                DownloadState::UrlValidated,
                DownloadState::PathValidated,
                DownloadState::ConflictChecked,
                DownloadState::Extracting,
                DownloadState::Cleaning,
                DownloadState::Recorded,
            ]
        );
        assert_eq!(report.outcome.title, "Song Title");
        assert_eq!(report.outputs, vec![output.clone()]);
        assert!(output.exists());

        let records = history.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, URL);
        assert_eq!(records[0].title, "Song Title");
    }

    #[test]
    fn test_scenario_b_declined_overwrite_cancels() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        std::fs::write(dir.join("Song Title.mp3"), "old").unwrap();

        let mut extractor = MockExtractor::new();
        extractor
            .expect_probe()
            .returning(|_| Ok(single("Song Title")));
        extractor.expect_fetch().never();
        let mut prompt = MockPrompt::new();
        prompt
            .expect_confirm_overwrite()
            .times(1)
            .returning(|_| false);

        let (orchestrator, history) = orchestrator(&dir, extractor, prompt);
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);

        assert!(!report.is_success());
        assert!(report.is_cancelled());
        assert_eq!(report.final_state(), DownloadState::Failed);
        assert!(!report.visited(DownloadState::Extracting));
        assert!(report.message().starts_with("Download cancelled"));
        assert!(history.list().is_empty());
        assert_eq!(std::fs::read_to_string(dir.join("Song Title.mp3")).unwrap(), "old");
    }

    #[test]
    fn test_accepted_overwrite_forces_extractor() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        std::fs::write(dir.join("Song Title.m4a"), "old").unwrap();

        let mut extractor = MockExtractor::new();
        extractor
            .expect_probe()
            .returning(|_| Ok(single("Song Title")));
        extractor.expect_fetch().times(1).returning(|_, options, _| {
            assert!(options.overwrite);
            Ok(FetchedMedia {
                id: "abc".to_string(),
                title: "Song Title".to_string(),
                outputs: Vec::new(),
            })
        });
        let mut prompt = MockPrompt::new();
        prompt
            .expect_confirm_overwrite()
            .withf(|path| path.ends_with("Song Title.m4a"))
            .returning(|_| true);

        let (orchestrator, _history) = orchestrator(&dir, extractor, prompt);
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);
        assert!(report.is_success(), "{}", report.message());
    }

    #[test]
    fn test_scenario_c_failed_fetch_keeps_partials() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let partial = dir.join("Song Title.webm.part");
        std::fs::write(&partial, "partial").unwrap();

        let mut extractor = MockExtractor::new();
        extractor
            .expect_probe()
            .returning(|_| Ok(single("Song Title")));
        extractor.expect_fetch().returning(|url, _, _| {
            Err(DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason: "HTTP Error 403: Forbidden".to_string(),
            }
            .into())
        });
        let prompt = MockPrompt::new();

        let (orchestrator, history) = orchestrator(&dir, extractor, prompt);
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);

        assert_eq!(report.final_state(), DownloadState::Failed);
        assert_eq!(report.error_kind, Some(ErrorKind::ExtractionError));
        assert!(!report.visited(DownloadState::Cleaning));
        assert!(report.cleanup.is_none());
        assert!(report.outcome.error.as_deref().unwrap().contains("403"));
        assert!(partial.exists());
        assert!(history.list().is_empty());
    }

    #[test]
    fn test_invalid_url_makes_no_calls() {
        let temp_dir = TempDir::new().unwrap();
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().never();
        extractor.expect_fetch().never();

        let (orchestrator, _history) = orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        for url in ["", "   ", "not a url"] {
            let report = orchestrator.execute(&DownloadRequest::audio(url), None);
            assert_eq!(report.error_kind, Some(ErrorKind::InvalidUrl));
            assert_eq!(report.states, vec![DownloadState::Idle, DownloadState::Failed]);
        }
    }

    #[test]
    fn test_missing_output_directory_fails_before_probe() {
        let temp_dir = TempDir::new().unwrap();
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().never();
        extractor.expect_fetch().never();

        let history = Arc::new(HistoryStore::open(temp_dir.path().join("h.json")));
        let config = AppConfig {
            audio_path: temp_dir.path().join("missing"),
            ..config_for(temp_dir.path())
        };
        let orchestrator =
            DownloadOrchestrator::new(Arc::new(config), Arc::new(extractor), history);
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);

        assert_eq!(report.error_kind, Some(ErrorKind::PathNotFound));
        assert!(report.visited(DownloadState::UrlValidated));
        assert!(!report.visited(DownloadState::PathValidated));
    }

    #[test]
    fn test_read_only_output_directory_is_permission_denied() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_dir("/music");
        fs.set_read_only("/music");

        let mut extractor = MockExtractor::new();
        extractor.expect_fetch().never();
        let history = Arc::new(HistoryStore::with_fs("/data/h.json", fs.clone()));
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(config_for(Path::new("/music"))),
            Arc::new(extractor),
            history,
        )
        .with_fs(fs);

        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);
        assert_eq!(report.error_kind, Some(ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_probe_failure_falls_back_to_url_title() {
        let temp_dir = TempDir::new().unwrap();
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|url| {
            Err(DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason: "offline".to_string(),
            }
            .into())
        });
        extractor.expect_fetch().returning(|_, _, _| {
            Ok(FetchedMedia {
                id: String::new(),
                title: String::new(),
                outputs: Vec::new(),
            })
        });

        let (orchestrator, history) =
            orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);

        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.outcome.title, URL);
        assert_eq!(history.list()[0].title, URL);
    }

    #[test]
    fn test_playlist_selector_passed_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://www.youtube.com/playlist?list=PL1";

        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|_| {
            Ok(MediaInfo {
                id: "PL1".to_string(),
                title: "Mix".to_string(),
                entries: vec![PlaylistEntry {
                    index: 1,
                    id: "a".to_string(),
                    title: "First".to_string(),
                }],
            })
        });
        extractor.expect_fetch().times(1).returning(|_, options, _| {
            assert_eq!(options.playlist_items.as_deref(), Some("1,3,5-7"));
            Ok(FetchedMedia {
                id: "a".to_string(),
                title: "First".to_string(),
                outputs: Vec::new(),
            })
        });
        let mut prompt = MockPrompt::new();
        prompt.expect_playlist_selection().never();

        let (orchestrator, history) = orchestrator(temp_dir.path(), extractor, prompt);
        let request =
            DownloadRequest::video(url).with_playlist_items(Some("1,3,5-7".to_string()));
        let report = orchestrator.execute(&request, None);

        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.outcome.title, "Mix");
        assert_eq!(history.list()[0].title, "Mix");
    }

    #[test]
    fn test_playlist_prompt_choices() {
        let temp_dir = TempDir::new().unwrap();
        let url = "https://www.youtube.com/playlist?list=PL1";

        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|_| Ok(single("Mix")));
        extractor.expect_fetch().times(1).returning(|_, options, _| {
            assert_eq!(options.playlist_items.as_deref(), Some("2"));
            Ok(FetchedMedia {
                id: "b".to_string(),
                title: "Second".to_string(),
                outputs: Vec::new(),
            })
        });
        let mut prompt = MockPrompt::new();
        let mut calls = 0;
        prompt.expect_playlist_selection().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                PlaylistChoice::Items("2".to_string())
            } else {
                PlaylistChoice::Cancel
            }
        });

        let (orchestrator, _history) = orchestrator(temp_dir.path(), extractor, prompt);
        let report = orchestrator.execute(&DownloadRequest::audio(url), None);
        assert!(report.is_success(), "{}", report.message());

        let report = orchestrator.execute(&DownloadRequest::audio(url), None);
        assert!(report.is_cancelled());
        assert!(!report.visited(DownloadState::Extracting));
    }

    #[test]
    fn test_cleanup_runs_only_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let output = dir.join("Clip.webm");

        let extractor_for = |output: PathBuf| {
            let mut extractor = MockExtractor::new();
            extractor.expect_probe().returning(|_| Ok(single("Clip")));
            extractor.expect_fetch().returning(move |_, _, _| {
                std::fs::write(&output, "video").unwrap();
                std::fs::write(output.with_extension("f137.mp4.part"), "x").unwrap();
                Ok(FetchedMedia {
                    id: "abc".to_string(),
                    title: "Clip".to_string(),
                    outputs: vec![output.clone()],
                })
            });
            extractor
        };

        let (orchestrator, _history) =
            orchestrator(&dir, extractor_for(output.clone()), MockPrompt::new());
        let report = orchestrator.execute(&DownloadRequest::video(URL), None);
        assert!(report.is_success(), "{}", report.message());
        assert!(output.exists());
        assert!(!dir.join("Clip.f137.mp4.part").exists());
        assert_eq!(report.cleanup.as_ref().unwrap().deleted.len(), 1);

        std::fs::remove_file(&output).unwrap();
        let history = Arc::new(HistoryStore::open(dir.join("h.json")));
        let config = AppConfig {
            auto_delete_temp: false,
            ..config_for(&dir)
        };
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(config),
            Arc::new(extractor_for(output.clone())),
            history,
        );
        let report = orchestrator.execute(&DownloadRequest::video(URL), None);
        assert!(report.is_success(), "{}", report.message());
        assert!(report.cleanup.is_none());
        assert!(dir.join("Clip.f137.mp4.part").exists());
    }

    #[test]
    fn test_history_failure_is_a_warning() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_dir("/music");
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|_| Ok(single("Song")));
        extractor.expect_fetch().returning(|_, _, _| {
            Ok(FetchedMedia {
                id: "abc".to_string(),
                title: "Song".to_string(),
                outputs: Vec::new(),
            })
        });
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|title| title == "Song")
            .times(1)
            .return_const(());

        let history = Arc::new(HistoryStore::with_fs("/data/h.json", fs.clone()));
        fs.fail_writes();
        let orchestrator = DownloadOrchestrator::new(
            Arc::new(config_for(Path::new("/music"))),
            Arc::new(extractor),
            history,
        )
        .with_fs(fs)
        .with_notifier(Arc::new(notifier));

        let report = orchestrator.execute(&DownloadRequest::audio(URL), None);
        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.final_state(), DownloadState::Recorded);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("History not updated"));
    }

    #[test]
    fn test_play_online_records_history_then_plays() {
        let temp_dir = TempDir::new().unwrap();
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|_| Ok(single("Live Set")));
        let mut player = MockPlaybackRunner::new();
        player.expect_is_available().return_const(true);
        player
            .expect_play()
            .withf(|target| target == URL)
            .times(1)
            .returning(|_| Ok(PlayerExit { code: Some(0) }));

        let (orchestrator, history) =
            orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        let orchestrator = orchestrator.with_player(Arc::new(player));

        let report = orchestrator.dispatch(Command::PlayOnline { url: URL.to_string() }, None);
        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.message(), "Played: Live Set");
        assert_eq!(history.list()[0].title, "Live Set");
    }

    #[test]
    fn test_play_online_without_player() {
        let temp_dir = TempDir::new().unwrap();
        let mut extractor = MockExtractor::new();
        extractor.expect_probe().never();
        let mut player = MockPlaybackRunner::new();
        player.expect_is_available().return_const(false);
        player.expect_play().never();

        let (orchestrator, history) =
            orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        let report = orchestrator.with_player(Arc::new(player)).play_online(URL);
        assert!(!report.is_success());
        assert!(report.message().contains("mpv"));
        assert!(history.list().is_empty());
    }

    #[test]
    fn test_url_helpers() {
        assert!(is_valid_url("https://youtu.be/abc"));
        assert!(is_valid_url("youtube.com/watch?v=abc"));
        assert!(is_valid_url("http://example.com/video"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("ftp://example.com"));

        assert!(is_playlist_url("https://www.youtube.com/PLAYLIST?list=1"));
        assert!(!is_playlist_url("https://youtu.be/abc"));
        assert!(is_tiktok_url("https://www.TikTok.com/@user/video/1"));

        assert_eq!(selector_from_indices(&[1, 3, 5]), "1,3,5");
        assert_eq!(selector_from_indices(&[]), "");
    }

    #[test]
    fn test_tiktok_cookie_warning_does_not_block() {
        use crate::cookies::MockCookieValidator;

        let temp_dir = TempDir::new().unwrap();
        let url = "https://www.tiktok.com/@user/video/1";
        let store = Arc::new(CookieStore::open(
            temp_dir.path().join("cookies.json"),
            temp_dir.path().join("cookies.txt"),
        ));
        let mut validator = MockCookieValidator::new();
        validator.expect_validate().never();

        let mut extractor = MockExtractor::new();
        extractor.expect_probe().returning(|_| Ok(single("Dance")));
        extractor.expect_fetch().returning(|_, _, _| {
            Ok(FetchedMedia {
                id: "1".to_string(),
                title: "Dance".to_string(),
                outputs: Vec::new(),
            })
        });

        let (orchestrator, _history) =
            orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        let orchestrator = orchestrator.with_cookie_check(store, Arc::new(validator));
        let report = orchestrator.execute(&DownloadRequest::video(url), None);

        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("missing"));
    }

    #[test]
    fn test_invalid_tiktok_url_skips_session_check() {
        use crate::cookies::MockCookieValidator;

        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(CookieStore::open(
            temp_dir.path().join("cookies.json"),
            temp_dir.path().join("cookies.txt"),
        ));
        store
            .replace(r#"[{"domain": ".tiktok.com", "name": "sessionid", "value": "abc"}]"#)
            .unwrap();
        let mut validator = MockCookieValidator::new();
        validator.expect_validate().never();

        let mut extractor = MockExtractor::new();
        extractor.expect_probe().never();
        extractor.expect_fetch().never();

        let (orchestrator, _history) =
            orchestrator(temp_dir.path(), extractor, MockPrompt::new());
        let orchestrator = orchestrator.with_cookie_check(store, Arc::new(validator));
        let report = orchestrator.execute(&DownloadRequest::video("tiktok.com/@user/video/1"), None);

        assert_eq!(report.error_kind, Some(ErrorKind::InvalidUrl));
        assert!(report.warnings.is_empty());
    }
}
