//! Media extraction engine boundary.
//!
//! The orchestrator only sees the [`Extractor`] trait. [`YtDlpExtractor`]
//! implements it by driving the `yt-dlp` executable: metadata probes use a
//! single JSON dump, downloads stream machine-readable progress lines which
//! are turned into [`ProgressEvent`]s. Because `--print` puts yt-dlp in quiet
//! mode, progress arrives on stderr while final paths arrive on stdout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tubesaver_core::extractor::{Extractor, YtDlpExtractor};
//!
//! let extractor = YtDlpExtractor::new();
//! let info = extractor.probe("https://youtu.be/dQw4w9WgXcQ").unwrap();
//! println!("{}", info.title);
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DownloadError, Error, Result};
use crate::options::{ExtractionOptions, MediaKind};

/// Default executable name, resolved through `PATH`.
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

const PROGRESS_PREFIX: &str = "[tubesaver:progress]";
const PROCESSING_PREFIX: &str = "[tubesaver:processing]";
const DONE_PREFIX: &str = "[tubesaver:done]";

/// One entry of a flat playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// 1-based position in the playlist.
    pub index: usize,
    /// Video ID.
    pub id: String,
    /// Video title.
    pub title: String,
}

/// Metadata returned by a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Video or playlist ID.
    pub id: String,
    /// Video or playlist title.
    pub title: String,
    /// Playlist entries; empty for single items.
    pub entries: Vec<PlaylistEntry>,
}

impl MediaInfo {
    /// Whether the probed URL is a playlist.
    #[must_use]
    pub fn is_playlist(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedMedia {
    /// ID of the (last) fetched item.
    pub id: String,
    /// Title of the (last) fetched item.
    pub title: String,
    /// Final file paths, one per fetched item.
    pub outputs: Vec<PathBuf>,
}

/// Advisory progress emitted while fetching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Raw download in progress.
    Downloading {
        /// Percentage complete, 0-100.
        percent: f64,
    },
    /// Raw fetch finished, post-processing (transcode, merge, tagging).
    Processing,
    /// An item reached its final location.
    Finished,
}

/// Callback receiving progress while fetching.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Extraction engine abstraction for testability.
#[cfg_attr(test, mockall::automock)]
pub trait Extractor: Send + Sync {
    /// Fetch metadata without downloading.
    ///
    /// # Errors
    ///
    /// Returns an extraction error if the engine fails.
    fn probe(&self, url: &str) -> Result<MediaInfo>;

    /// Download `url` according to `options`, reporting progress.
    ///
    /// # Errors
    ///
    /// Returns an extraction error carrying the engine's message.
    fn fetch(
        &self,
        url: &str,
        options: &ExtractionOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchedMedia>;
}

/// Format selector for a video quality tier.
#[must_use]
pub fn video_format_selector(quality_tier: &str) -> String {
    match quality_tier {
        "1080p" | "720p" | "480p" | "360p" => {
            let height = quality_tier.trim_end_matches('p');
            format!(
                "bestvideo[height<={height}][ext=mp4]+bestaudio[ext=m4a]/best[height<={height}][ext=mp4]"
            )
        }
        _ => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
    }
}

/// Bitrate argument for an audio quality tier (`320kb` becomes `320K`).
#[must_use]
pub fn audio_quality_arg(quality_tier: &str) -> String {
    let tier = quality_tier.trim();
    let lower = tier.to_ascii_lowercase();
    lower
        .strip_suffix("kb")
        .map_or_else(|| tier.to_string(), |rate| format!("{rate}K"))
}

/// Parsed form of one output line of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchLine {
    /// A progress update.
    Progress(ProgressEvent),
    /// An item reached its final path.
    Done {
        /// Item ID.
        id: String,
        /// Item title.
        title: String,
        /// Final file path.
        path: PathBuf,
    },
}

/// Parse a line printed by a fetch started with [`YtDlpExtractor::fetch_args`].
#[must_use]
pub fn parse_fetch_line(line: &str) -> Option<FetchLine> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        let percent: f64 = rest.trim().trim_end_matches('%').trim().parse().ok()?;
        return Some(FetchLine::Progress(ProgressEvent::Downloading {
            percent: percent.clamp(0.0, 100.0),
        }));
    }
    if line.starts_with(PROCESSING_PREFIX) {
        return Some(FetchLine::Progress(ProgressEvent::Processing));
    }
    if let Some(rest) = line.strip_prefix(DONE_PREFIX) {
        let mut parts = rest.trim_start().splitn(3, '\t');
        let id = parts.next()?.to_string();
        let title = parts.next()?.to_string();
        let path = PathBuf::from(parts.next()?);
        return Some(FetchLine::Done { id, title, path });
    }
    None
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Parse the JSON document printed by a probe.
///
/// # Errors
///
/// Returns a serialization error if the document is not JSON.
pub fn parse_probe_json(url: &str, json: &str) -> Result<MediaInfo> {
    let value: Value = serde_json::from_str(json)?;

    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| PlaylistEntry {
                    index: i + 1,
                    id: str_field(entry, "id").unwrap_or_default(),
                    title: str_field(entry, "title").unwrap_or_else(|| "No Title".to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(MediaInfo {
        id: str_field(&value, "id").unwrap_or_default(),
        title: str_field(&value, "title").unwrap_or_else(|| url.to_string()),
        entries,
    })
}

/// Extractor backed by the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
    proxy: Option<String>,
    cookie_file: Option<PathBuf>,
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpExtractor {
    /// Use `yt-dlp` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Use a specific executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            proxy: None,
            cookie_file: None,
        }
    }

    /// Route probes through a proxy.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Authenticate probes with a Netscape cookie file.
    #[must_use]
    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Arguments for a metadata-only probe.
    #[must_use]
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--flat-playlist",
            "--no-warnings",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        if let Some(proxy) = &self.proxy {
            args.extend(["--proxy".to_string(), proxy.clone()]);
        }
        if let Some(cookies) = &self.cookie_file {
            args.extend(["--cookies".to_string(), cookies.display().to_string()]);
        }
        args.extend(["--".to_string(), url.to_string()]);
        args
    }

    /// Arguments for a download.
    #[must_use]
    pub fn fetch_args(url: &str, options: &ExtractionOptions) -> Vec<String> {
        let progress = format!("download:{PROGRESS_PREFIX} %(progress._percent_str)s");
        let processing = format!("postprocess:{PROCESSING_PREFIX} %(progress.postprocessor)s");
        let done = format!("after_move:{DONE_PREFIX} %(id)s\t%(title)s\t%(filepath)s");

        let mut args: Vec<String> = Vec::new();
        push_args(
            &mut args,
            &[
                "--newline",
                "--progress",
                "--no-simulate",
                "--progress-template",
                progress.as_str(),
                "--progress-template",
                processing.as_str(),
                "--print",
                done.as_str(),
            ],
        );

        let format = &options.format;
        let container = format.container_or_codec.as_str();
        match options.media_kind {
            MediaKind::Audio => {
                let quality = audio_quality_arg(&format.quality_tier);
                push_args(
                    &mut args,
                    &[
                        "-f",
                        "bestaudio/best",
                        "--extract-audio",
                        "--audio-format",
                        container,
                        "--audio-quality",
                        quality.as_str(),
                    ],
                );
            }
            MediaKind::Video => {
                let selector = video_format_selector(&format.quality_tier);
                push_args(
                    &mut args,
                    &[
                        "-f",
                        selector.as_str(),
                        "--merge-output-format",
                        container,
                        "--remux-video",
                        container,
                    ],
                );
            }
        }

        if let Some(languages) = &options.subtitle_languages {
            let languages = languages.join(",");
            push_args(&mut args, &["--write-subs", "--sub-langs", languages.as_str()]);
        }
        if options.embed_thumbnail {
            push_args(&mut args, &["--embed-thumbnail"]);
        }
        if options.embed_metadata {
            push_args(&mut args, &["--embed-metadata"]);
        }
        if let Some(proxy) = &options.proxy {
            push_args(&mut args, &["--proxy", proxy.as_str()]);
        }
        if let Some(cookies) = &options.cookie_file {
            let cookies = cookies.display().to_string();
            push_args(&mut args, &["--cookies", cookies.as_str()]);
        }
        if let Some(items) = &options.playlist_items {
            push_args(&mut args, &["--playlist-items", items.as_str()]);
        }
        if options.overwrite {
            push_args(&mut args, &["--force-overwrites"]);
        }
        push_args(&mut args, &["-o", options.output_template.as_str(), "--", url]);
        args
    }

    fn spawn_error(&self, e: &std::io::Error) -> Error {
        Error::Download(DownloadError::ExtractorUnavailable {
            program: self.program_name(),
            reason: e.to_string(),
        })
    }
}

fn process_lost(url: &str, e: &std::io::Error) -> Error {
    DownloadError::ExtractionFailed {
        url: url.to_string(),
        reason: format!("lost track of the extractor process: {e}"),
    }
    .into()
}

/// A line read from one of the engine's output streams.
enum StreamLine {
    Stdout(String),
    Stderr(String),
}

fn forward_lines(
    stream: impl Read + Send + 'static,
    tx: mpsc::Sender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines().map_while(std::result::Result::ok) {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

fn push_args(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|item| (*item).to_string()));
}

fn failure_reason(stderr: &str, status: std::process::ExitStatus) -> String {
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map_or_else(
            || format!("extractor exited with {status}"),
            |line| line.trim_start_matches("ERROR:").trim().to_string(),
        )
}

impl Extractor for YtDlpExtractor {
    fn probe(&self, url: &str) -> Result<MediaInfo> {
        debug!("Probing metadata for {}", url);
        let output = Command::new(&self.program)
            .args(self.probe_args(url))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason: failure_reason(&stderr, output.status),
            }
            .into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_json(url, &stdout).map_err(|e| {
            DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason: format!("unreadable metadata: {e}"),
            }
            .into()
        })
    }

    fn fetch(
        &self,
        url: &str,
        options: &ExtractionOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchedMedia> {
        let args = Self::fetch_args(url, options);
        debug!(program = %self.program_name(), ?args, "starting extractor");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&e))?;

        // Both pipes are drained concurrently so neither can fill up; the
        // callback only ever runs on this thread.
        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone(), StreamLine::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone(), StreamLine::Stderr));
        }
        drop(tx);

        let emit = |event: ProgressEvent| {
            if let Some(callback) = &progress {
                callback(event);
            }
        };
        let mut fetched = FetchedMedia {
            id: String::new(),
            title: String::new(),
            outputs: Vec::new(),
        };
        let mut stderr = String::new();

        for message in rx {
            let (line, from_stderr) = match message {
                StreamLine::Stdout(line) => (line, false),
                StreamLine::Stderr(line) => (line, true),
            };
            match parse_fetch_line(&line) {
                Some(FetchLine::Progress(event)) => emit(event),
                Some(FetchLine::Done { id, title, path }) => {
                    info!("Saved {}", path.display());
                    fetched.id = id;
                    fetched.title = title;
                    fetched.outputs.push(path);
                    emit(ProgressEvent::Finished);
                }
                None if from_stderr => {
                    stderr.push_str(&line);
                    stderr.push('\n');
                }
                None => debug!(target: "tubesaver::extractor::stdout", "{}", line),
            }
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait().map_err(|e| process_lost(url, &e))?;

        if !status.success() {
            let reason = failure_reason(&stderr, status);
            warn!(context = "Extractor", "Extraction of {} failed: {}", url, reason);
            return Err(DownloadError::ExtractionFailed {
                url: url.to_string(),
                reason,
            }
            .into());
        }

        Ok(fetched)
    }
}
