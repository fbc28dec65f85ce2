//! Typed download options resolved from the configuration.
//!
//! [`ExtractionOptions`] is engine-neutral; the extractor translates it to
//! its own command-line or API shape at the boundary.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::{AUDIO_FALLBACK_EXTENSIONS, VIDEO_FALLBACK_EXTENSIONS, candidate_extensions};
use crate::config::AppConfig;

/// Sub-folder layout used when `create_subfolders` is enabled.
pub const SUBFOLDER_TEMPLATE: &str = "%(uploader)s/%(playlist_title)s";

/// File name template for every output.
pub const FILE_NAME_TEMPLATE: &str = "%(title)s.%(ext)s";

/// What kind of output a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio-only extraction.
    Audio,
    /// Video with audio.
    Video,
}

impl MediaKind {
    /// Log context label for downloads of this kind.
    #[must_use]
    pub const fn context(self) -> &'static str {
        match self {
            Self::Audio => "DownloadAudio",
            Self::Video => "DownloadVideo",
        }
    }

    /// Extensions probed after the configured one during the conflict check.
    #[must_use]
    pub const fn fallback_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Audio => AUDIO_FALLBACK_EXTENSIONS,
            Self::Video => VIDEO_FALLBACK_EXTENSIONS,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Target container/codec and quality tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Audio codec (`mp3`, `opus`, ...) or video container (`mp4`, ...).
    pub container_or_codec: String,
    /// Quality tier (`320kb`, `1080p`, ...).
    pub quality_tier: String,
}

impl FormatSpec {
    /// Resolve the configured format for `kind`.
    #[must_use]
    pub fn for_kind(kind: MediaKind, config: &AppConfig) -> Self {
        match kind {
            MediaKind::Audio => Self {
                container_or_codec: config.default_audio_format.clone(),
                quality_tier: config.default_audio_quality.clone(),
            },
            MediaKind::Video => Self {
                container_or_codec: config.default_video_format.clone(),
                quality_tier: config.default_video_quality.clone(),
            },
        }
    }

    /// Extension list for the conflict check: configured first, then fallbacks.
    #[must_use]
    pub fn conflict_extensions(&self, kind: MediaKind) -> Vec<String> {
        candidate_extensions(&self.container_or_codec, kind.fallback_extensions())
    }
}

/// Where outputs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Configured base directory.
    pub base_directory: PathBuf,
    /// Optional sub-folder template relative to the base.
    pub subfolder_template: Option<String>,
}

impl OutputTarget {
    /// Resolve the output target for `kind`.
    #[must_use]
    pub fn for_kind(kind: MediaKind, config: &AppConfig) -> Self {
        let base_directory = match kind {
            MediaKind::Audio => config.audio_path.clone(),
            MediaKind::Video => config.video_path.clone(),
        };
        Self {
            base_directory,
            subfolder_template: config
                .create_subfolders
                .then(|| SUBFOLDER_TEMPLATE.to_string()),
        }
    }

    /// Whether the output directory depends on metadata not yet known.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.subfolder_template
            .as_deref()
            .is_some_and(|template| template.contains("%("))
    }

    /// Directory used for the pre-extraction conflict check.
    ///
    /// With unresolved placeholders this is the base directory, so existing
    /// files inside sub-folders are not detected.
    #[must_use]
    pub fn conflict_directory(&self) -> PathBuf {
        match self.subfolder_template.as_deref() {
            Some(template) if !self.has_placeholders() => self.base_directory.join(template),
            _ => self.base_directory.clone(),
        }
    }

    /// Full output template handed to the extractor.
    #[must_use]
    pub fn output_template(&self) -> String {
        let dir: &Path = &self.base_directory;
        let dir = match self.subfolder_template.as_deref() {
            Some(template) => dir.join(template),
            None => dir.to_path_buf(),
        };
        dir.join(FILE_NAME_TEMPLATE).to_string_lossy().into_owned()
    }
}

/// Everything the extractor needs to fetch one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Target format.
    pub format: FormatSpec,
    /// Output path template.
    pub output_template: String,
    /// Subtitle languages when subtitles are requested.
    pub subtitle_languages: Option<Vec<String>>,
    /// Proxy URL.
    pub proxy: Option<String>,
    /// Playlist item selector passed through verbatim (e.g. `1,3,5-7`).
    pub playlist_items: Option<String>,
    /// Netscape cookie file.
    pub cookie_file: Option<PathBuf>,
    /// Embed the thumbnail as cover art.
    pub embed_thumbnail: bool,
    /// Write title/uploader tags.
    pub embed_metadata: bool,
    /// Replace an existing output the user agreed to overwrite.
    pub overwrite: bool,
}

impl ExtractionOptions {
    /// Build options for `kind` from the configuration and output target.
    #[must_use]
    pub fn new(kind: MediaKind, config: &AppConfig, target: &OutputTarget) -> Self {
        let subtitle_languages = (kind == MediaKind::Video && config.download_subtitles)
            .then(|| config.subtitle_languages.clone());
        Self {
            media_kind: kind,
            format: FormatSpec::for_kind(kind, config),
            output_template: target.output_template(),
            subtitle_languages,
            proxy: config.proxy().map(str::to_string),
            playlist_items: None,
            cookie_file: None,
            embed_thumbnail: true,
            embed_metadata: true,
            overwrite: false,
        }
    }

    /// Restrict a playlist to the given selector.
    #[must_use]
    pub fn with_playlist_items(mut self, selector: Option<String>) -> Self {
        self.playlist_items = selector.filter(|s| !s.trim().is_empty());
        self
    }

    /// Authenticate with the given cookie file.
    #[must_use]
    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    /// Overwrite existing outputs instead of skipping them.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}
