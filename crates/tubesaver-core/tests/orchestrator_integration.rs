//! End-to-end tests for download orchestration over a real temporary
//! directory, with an in-process extractor standing in for `yt-dlp`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tubesaver_core::{
    AppConfig, ArtifactResolver, ConfigManager, DownloadError, DownloadOrchestrator,
    DownloadRequest, DownloadState, ErrorKind, ExtractionOptions, Extractor, FetchedMedia,
    HistoryRecord, HistoryStore, MAX_HISTORY_ENTRIES, MediaInfo, PathValidator, PlaylistChoice,
    PlaylistEntry, ProgressCallback, ProgressEvent, Prompt, Result, TempCleaner,
};

/// Extractor that writes `{title}.{ext}` plus a leftover fragment into the
/// output template's directory.
struct FakeExtractor {
    title: String,
    fail_with: Option<String>,
    fetches: AtomicUsize,
    seen_options: Mutex<Vec<ExtractionOptions>>,
}

impl FakeExtractor {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fail_with: None,
            fetches: AtomicUsize::new(0),
            seen_options: Mutex::new(Vec::new()),
        }
    }

    fn failing(title: &str, reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::new(title)
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Extractor for FakeExtractor {
    fn probe(&self, _url: &str) -> Result<MediaInfo> {
        Ok(MediaInfo {
            id: "abc".to_string(),
            title: self.title.clone(),
            entries: Vec::new(),
        })
    }

    fn fetch(
        &self,
        url: &str,
        options: &ExtractionOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchedMedia> {
        let on_progress = |event| {
            if let Some(progress) = &progress {
                progress(event);
            }
        };
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.seen_options.lock().unwrap().push(options.clone());

        let dir = PathBuf::from(&options.output_template)
            .parent()
            .unwrap()
            .to_path_buf();
        on_progress(ProgressEvent::Downloading { percent: 42.0 });
        std::fs::write(dir.join(format!("{}.f251.webm.part", self.title)), "partial").unwrap();

        if let Some(reason) = &self.fail_with {
            return Err(DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason: reason.clone(),
            }
            .into());
        }

        on_progress(ProgressEvent::Processing);
        let output = dir.join(format!("{}.{}", self.title, options.format.container_or_codec));
        std::fs::write(&output, "media").unwrap();
        on_progress(ProgressEvent::Finished);
        Ok(FetchedMedia {
            id: "abc".to_string(),
            title: self.title.clone(),
            outputs: vec![output],
        })
    }
}

/// Prompt answering overwrite questions from a fixed value and counting them.
struct ScriptedPrompt {
    overwrite: bool,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    fn answering(overwrite: bool) -> Self {
        Self {
            overwrite,
            asked: AtomicUsize::new(0),
        }
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm_overwrite(&self, _existing: &Path) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.overwrite
    }

    fn playlist_selection(&self, _url: &str, _entries: &[PlaylistEntry]) -> PlaylistChoice {
        PlaylistChoice::All
    }
}

struct Fixture {
    _temp_dir: TempDir,
    music: PathBuf,
    history: Arc<HistoryStore>,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let music = temp_dir.path().join("Music");
        std::fs::create_dir(&music).unwrap();
        let history = Arc::new(HistoryStore::open(
            temp_dir.path().join("history_online.json"),
        ));
        Self {
            _temp_dir: temp_dir,
            music,
            history,
        }
    }

    fn config(&self) -> AppConfig {
        AppConfig {
            audio_path: self.music.clone(),
            video_path: self.music.clone(),
            create_subfolders: false,
            ..AppConfig::default()
        }
    }

    fn orchestrator(
        &self,
        extractor: Arc<FakeExtractor>,
        prompt: Arc<ScriptedPrompt>,
    ) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            Arc::new(self.config()),
            extractor,
            Arc::clone(&self.history),
        )
        .with_prompt(prompt)
    }
}

#[test]
fn scenario_a_fresh_download_is_recorded() {
    let fixture = Fixture::new();
    let extractor = Arc::new(FakeExtractor::new("Song Title"));
    let orchestrator = fixture.orchestrator(
        Arc::clone(&extractor),
        Arc::new(ScriptedPrompt::answering(false)),
    );

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    let report = orchestrator.execute(
        &DownloadRequest::audio("https://youtu.be/abc"),
        Some(Box::new(move |event| sink.lock().unwrap().push(event))),
    );

    assert!(report.is_success(), "{}", report.message());
    assert_eq!(report.final_state(), DownloadState::Recorded);
    assert!(fixture.music.join("Song Title.mp3").exists());
    assert!(!fixture.music.join("Song Title.f251.webm.part").exists());
    assert_eq!(progress.lock().unwrap().len(), 3);

    let records = fixture.history.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "https://youtu.be/abc");
}

#[test]
fn scenario_b_declined_overwrite_leaves_everything_untouched() {
    let fixture = Fixture::new();
    std::fs::write(fixture.music.join("Song Title.mp3"), "old").unwrap();
    let extractor = Arc::new(FakeExtractor::new("Song Title"));
    let prompt = Arc::new(ScriptedPrompt::answering(false));
    let orchestrator = fixture.orchestrator(Arc::clone(&extractor), Arc::clone(&prompt));

    let report = orchestrator.execute(&DownloadRequest::audio("https://youtu.be/abc"), None);

    assert!(report.is_cancelled());
    assert_eq!(report.error_kind, Some(ErrorKind::UserCancelled));
    assert_eq!(prompt.asked.load(Ordering::SeqCst), 1);
    assert_eq!(extractor.fetch_count(), 0);
    assert!(fixture.history.list().is_empty());
    assert_eq!(
        std::fs::read_to_string(fixture.music.join("Song Title.mp3")).unwrap(),
        "old"
    );
}

#[test]
fn accepted_overwrite_replaces_the_file() {
    let fixture = Fixture::new();
    std::fs::write(fixture.music.join("Song Title.mp3"), "old").unwrap();
    let extractor = Arc::new(FakeExtractor::new("Song Title"));
    let orchestrator = fixture.orchestrator(
        Arc::clone(&extractor),
        Arc::new(ScriptedPrompt::answering(true)),
    );

    let report = orchestrator.execute(&DownloadRequest::audio("https://youtu.be/abc"), None);

    assert!(report.is_success(), "{}", report.message());
    assert!(extractor.seen_options.lock().unwrap()[0].overwrite);
    assert_eq!(
        std::fs::read_to_string(fixture.music.join("Song Title.mp3")).unwrap(),
        "media"
    );
}

#[test]
fn scenario_c_extractor_failure_skips_cleanup_and_history() {
    let fixture = Fixture::new();
    let extractor = Arc::new(FakeExtractor::failing("Song Title", "Video unavailable"));
    let orchestrator = fixture.orchestrator(
        Arc::clone(&extractor),
        Arc::new(ScriptedPrompt::answering(false)),
    );

    let report = orchestrator.execute(&DownloadRequest::audio("https://youtu.be/abc"), None);

    assert_eq!(report.final_state(), DownloadState::Failed);
    assert_eq!(report.error_kind, Some(ErrorKind::ExtractionError));
    assert!(report.message().contains("Video unavailable"));
    assert!(fixture.music.join("Song Title.f251.webm.part").exists());
    assert!(fixture.history.list().is_empty());
}

#[test]
fn video_options_carry_subtitles_and_selector() {
    let fixture = Fixture::new();
    let extractor = Arc::new(FakeExtractor::new("Clip"));
    let orchestrator = fixture.orchestrator(
        Arc::clone(&extractor),
        Arc::new(ScriptedPrompt::answering(false)),
    );

    let request = DownloadRequest::video("https://www.youtube.com/playlist?list=PL1")
        .with_playlist_items(Some("1,3,5-7".to_string()));
    let report = orchestrator.execute(&request, None);
    assert!(report.is_success(), "{}", report.message());

    let options = extractor.seen_options.lock().unwrap()[0].clone();
    assert_eq!(options.playlist_items.as_deref(), Some("1,3,5-7"));
    assert_eq!(options.format.container_or_codec, "mp4");
    assert_eq!(
        options.subtitle_languages,
        Some(vec!["en".to_string(), "es".to_string()])
    );
}

#[test]
fn history_dedup_and_cap_invariants() {
    let temp_dir = TempDir::new().unwrap();
    let store = HistoryStore::open(temp_dir.path().join("history_online.json"));

    for i in 0..60 {
        store
            .append(HistoryRecord::now(format!("Song {i}"), format!("https://youtu.be/{i}")))
            .unwrap();
    }
    store
        .append(HistoryRecord::now("Song 20", "https://youtu.be/20"))
        .unwrap();

    let records = store.list();
    assert_eq!(records.len(), MAX_HISTORY_ENTRIES);
    let keys: HashSet<_> = records.iter().map(HistoryRecord::key).collect();
    assert_eq!(keys.len(), records.len());
    assert_eq!(records.last().unwrap().title, "Song 20");
    assert_eq!(records[0].title, "Song 10");
    assert!(!records.iter().any(|r| r.title == "Song 9"));
}

#[test]
fn cleanup_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    for name in ["Song.webm", "Song.f140.m4a", "Song.mp3.part", "Song.mp3", "Other.webm"] {
        std::fs::write(dir.join(name), "x").unwrap();
    }

    let cleaner = TempCleaner::default();
    let first = cleaner.cleanup(dir, "Song");
    assert_eq!(first.deleted.len(), 3);
    let second = cleaner.cleanup(dir, "Song");
    assert!(second.deleted.is_empty());
    assert!(second.is_success());
    assert!(dir.join("Song.mp3").exists());
    assert!(dir.join("Other.webm").exists());
}

#[test]
fn conflict_detection_follows_extension_order() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("title.wav"), "w").unwrap();
    std::fs::write(temp_dir.path().join("title.m4a"), "m").unwrap();

    let found = ArtifactResolver::default()
        .find_existing(temp_dir.path(), "title", &["mp3", "m4a", "wav"])
        .unwrap();
    assert_eq!(found, temp_dir.path().join("title.m4a"));
}

#[test]
fn path_validation_errors() {
    let err = PathValidator::default()
        .validate(Path::new("/nonexistent"), true, true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathNotFound);
}

#[test]
fn legacy_audio_quality_is_migrated_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{"default_audio_quality": "320"}"#).unwrap();

    let manager = ConfigManager::load(&path);
    assert_eq!(manager.snapshot().default_audio_quality, "320kb");
}
