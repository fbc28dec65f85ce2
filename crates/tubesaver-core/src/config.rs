//! Application configuration management.
//!
//! The configuration is a flat JSON object stored in `config.json` under the
//! application base directory. It is loaded once per process into an
//! immutable [`AppConfig`] snapshot; changes go through [`ConfigManager`],
//! which validates, persists and swaps in a new snapshot under a single
//! writer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Error, FileSystemError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::history::HISTORY_FILE_NAME;
use crate::paths::{PathValidator, expand_user};

/// Name of the application directory under the platform data dir.
pub const APP_DIR_NAME: &str = "tubesaver";

/// Config file name inside the base directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Cookie store file name inside the base directory.
pub const COOKIES_FILE_NAME: &str = "cookies.json";

/// Netscape cookie export consumed by the extractor.
pub const COOKIES_EXPORT_FILE_NAME: &str = "cookies.txt";

/// Log directory name inside the base directory.
pub const LOG_DIR_NAME: &str = "logs";

/// Lower bound for `max_concurrent_downloads`.
pub const MIN_CONCURRENT_DOWNLOADS: usize = 1;

/// Upper bound for `max_concurrent_downloads`.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Supported audio codecs.
pub const AUDIO_FORMATS: &[&str] = &["mp3", "aac", "m4a", "opus", "vorbis"];

/// Supported video containers.
pub const VIDEO_FORMATS: &[&str] = &["mp4", "mkv", "webm"];

/// Supported audio bitrates.
pub const AUDIO_QUALITIES: &[&str] = &["320kb", "192kb", "128kb", "96kb"];

/// Supported video quality tiers.
pub const VIDEO_QUALITIES: &[&str] = &["best", "1080p", "720p", "480p", "360p"];

/// Supported terminal accent colours.
pub const THEME_COLORS: &[&str] = &["cyan", "green", "yellow", "blue", "magenta", "red"];

const LEGACY_AUDIO_QUALITY: &str = "320";

/// Locations of everything the application persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

impl AppPaths {
    /// Use `root` as the base directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: expand_user(&root.into()),
        }
    }

    /// `<platform data dir>/tubesaver`.
    #[must_use]
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    /// The base directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `config.json`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Path of the history file.
    #[must_use]
    pub fn history_file(&self) -> PathBuf {
        self.root.join(HISTORY_FILE_NAME)
    }

    /// Path of the JSON cookie store.
    #[must_use]
    pub fn cookies_file(&self) -> PathBuf {
        self.root.join(COOKIES_FILE_NAME)
    }

    /// Path of the Netscape cookie export.
    #[must_use]
    pub fn cookies_export_file(&self) -> PathBuf {
        self.root.join(COOKIES_EXPORT_FILE_NAME)
    }

    /// Directory receiving log files.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }
}

fn default_audio_path() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("Music"))
}

fn default_video_path() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("Videos"))
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_video_format() -> String {
    "mp4".to_string()
}

fn default_audio_quality() -> String {
    "320kb".to_string()
}

fn default_video_quality() -> String {
    "1080p".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string(), "es".to_string()]
}

const fn default_max_concurrent() -> usize {
    MIN_CONCURRENT_DOWNLOADS
}

fn default_theme_color() -> String {
    "cyan".to_string()
}

fn default_notification_sound_file() -> PathBuf {
    PathBuf::from("/usr/share/sounds/freedesktop/stereo/complete.oga")
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory receiving audio downloads.
    #[serde(default = "default_audio_path")]
    pub audio_path: PathBuf,
    /// Directory receiving video downloads.
    #[serde(default = "default_video_path")]
    pub video_path: PathBuf,
    /// Target audio codec.
    #[serde(default = "default_audio_format")]
    pub default_audio_format: String,
    /// Target video container.
    #[serde(default = "default_video_format")]
    pub default_video_format: String,
    /// Audio bitrate tier, e.g. `320kb`.
    #[serde(default = "default_audio_quality")]
    pub default_audio_quality: String,
    /// Video quality tier, e.g. `1080p`.
    #[serde(default = "default_video_quality")]
    pub default_video_quality: String,
    /// Remove leftover partial files after a successful download.
    #[serde(default = "default_true")]
    pub auto_delete_temp: bool,
    /// Download subtitles with videos.
    #[serde(default = "default_true")]
    pub download_subtitles: bool,
    /// Subtitle languages, in preference order.
    #[serde(default = "default_subtitle_languages")]
    pub subtitle_languages: Vec<String>,
    /// Place output under `<uploader>/<playlist>/` sub-folders.
    #[serde(default = "default_true")]
    pub create_subfolders: bool,
    /// Worker pool size, clamped to 1..=8.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,
    /// Proxy passed to the extractor; empty for none.
    #[serde(default)]
    pub proxy_url: String,
    /// Terminal accent colour.
    #[serde(default = "default_theme_color")]
    pub theme_color: String,
    /// Play a sound when a download completes.
    #[serde(default = "default_true")]
    pub notification_sound: bool,
    /// Sound file used for completion notifications.
    #[serde(default = "default_notification_sound_file")]
    pub notification_sound_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            audio_path: default_audio_path(),
            video_path: default_video_path(),
            default_audio_format: default_audio_format(),
            default_video_format: default_video_format(),
            default_audio_quality: default_audio_quality(),
            default_video_quality: default_video_quality(),
            auto_delete_temp: true,
            download_subtitles: true,
            subtitle_languages: default_subtitle_languages(),
            create_subfolders: true,
            max_concurrent_downloads: default_max_concurrent(),
            proxy_url: String::new(),
            theme_color: default_theme_color(),
            notification_sound: true,
            notification_sound_file: default_notification_sound_file(),
        }
    }
}

fn reset_unknown(field: &str, value: &mut String, allowed: &[&str], fallback: fn() -> String) {
    if !allowed.contains(&value.as_str()) {
        warn!(
            context = "Config",
            "Unsupported {} '{}', using '{}'",
            field,
            value,
            fallback()
        );
        *value = fallback();
    }
}

fn check_choice(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "Invalid {field} '{value}', expected one of: {}",
            allowed.join(", ")
        )))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "Invalid value for {key}: '{value}' (expected true/false)"
        ))),
    }
}

impl AppConfig {
    /// Apply the legacy quality migration, clamp the worker count and
    /// replace unsupported choices with defaults.
    pub fn sanitize(&mut self) {
        if self.default_audio_quality == LEGACY_AUDIO_QUALITY {
            debug!("Migrating legacy audio quality '320' to '320kb'");
            self.default_audio_quality = default_audio_quality();
        }
        self.max_concurrent_downloads = self
            .max_concurrent_downloads
            .clamp(MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS);

        reset_unknown(
            "audio format",
            &mut self.default_audio_format,
            AUDIO_FORMATS,
            default_audio_format,
        );
        reset_unknown(
            "video format",
            &mut self.default_video_format,
            VIDEO_FORMATS,
            default_video_format,
        );
        reset_unknown(
            "audio quality",
            &mut self.default_audio_quality,
            AUDIO_QUALITIES,
            default_audio_quality,
        );
        reset_unknown(
            "video quality",
            &mut self.default_video_quality,
            VIDEO_QUALITIES,
            default_video_quality,
        );
        reset_unknown(
            "theme colour",
            &mut self.theme_color,
            THEME_COLORS,
            default_theme_color,
        );
    }

    /// Check every enumerated value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        check_choice("audio format", &self.default_audio_format, AUDIO_FORMATS)?;
        check_choice("video format", &self.default_video_format, VIDEO_FORMATS)?;
        check_choice("audio quality", &self.default_audio_quality, AUDIO_QUALITIES)?;
        check_choice("video quality", &self.default_video_quality, VIDEO_QUALITIES)?;
        check_choice("theme colour", &self.theme_color, THEME_COLORS)?;
        if !(MIN_CONCURRENT_DOWNLOADS..=MAX_CONCURRENT_DOWNLOADS)
            .contains(&self.max_concurrent_downloads)
        {
            return Err(Error::Configuration(format!(
                "max_concurrent_downloads must be between {MIN_CONCURRENT_DOWNLOADS} and {MAX_CONCURRENT_DOWNLOADS}"
            )));
        }
        if self.subtitle_languages.is_empty() {
            return Err(Error::Configuration(
                "At least one subtitle language is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured proxy, if any.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        let proxy = self.proxy_url.trim();
        (!proxy.is_empty()).then_some(proxy)
    }
}

/// Loads, caches and persists the configuration.
pub struct ConfigManager {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    current: RwLock<Arc<AppConfig>>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    /// Load the configuration at `path`, never failing.
    ///
    /// A missing file is created with defaults; a malformed one is reported
    /// as a config load error and defaults are used in memory.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_with_fs(path, Arc::new(RealFileSystem))
    }

    /// Like [`load`](Self::load) over a custom file system.
    pub fn load_with_fs(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        let path = path.into();
        let config = match read_config(fs.as_ref(), &path) {
            Ok(Some(config)) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Ok(None) => {
                debug!("Config file not found, writing defaults");
                let config = AppConfig::default();
                if let Err(e) = persist(fs.as_ref(), &path, &config) {
                    warn!(context = "Config", "Failed to save default config: {}", e);
                }
                config
            }
            Err(e) => {
                error!(context = "Config", kind = ?e.kind(), "{}", e);
                AppConfig::default()
            }
        };

        Self {
            path,
            fs,
            current: RwLock::new(Arc::new(config)),
            write_lock: Mutex::new(()),
        }
    }

    /// Strict load used by callers that want to see the failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigLoad`] if the file exists but cannot be read
    /// or parsed.
    pub fn try_load(path: &Path) -> Result<AppConfig> {
        Ok(read_config(&RealFileSystem, path)?.unwrap_or_default())
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AppConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply `change` to a copy of the current snapshot, validate, persist
    /// and publish it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the result is invalid, or a file
    /// system error if it cannot be saved. The current snapshot is kept.
    pub fn update<F>(&self, change: F) -> Result<Arc<AppConfig>>
    where
        F: FnOnce(&mut AppConfig),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = (*self.snapshot()).clone();
        change(&mut next);
        if next.default_audio_quality == LEGACY_AUDIO_QUALITY {
            next.default_audio_quality = default_audio_quality();
        }
        next.validate()?;
        persist(self.fs.as_ref(), &self.path, &next)?;

        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        info!("Saved config to {}", self.path.display());
        Ok(next)
    }

    /// Set a single key from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown keys or invalid values,
    /// or a path error when a directory key is not writable.
    pub fn set(&self, key: &str, value: &str) -> Result<Arc<AppConfig>> {
        let value = value.trim();
        match key {
            "audio_path" | "video_path" => {
                let dir = self.prepare_directory(value)?;
                self.update(|cfg| {
                    if key == "audio_path" {
                        cfg.audio_path = dir;
                    } else {
                        cfg.video_path = dir;
                    }
                })
            }
            "default_audio_format" => {
                check_choice("audio format", value, AUDIO_FORMATS)?;
                self.update(|cfg| cfg.default_audio_format = value.to_string())
            }
            "default_video_format" => {
                check_choice("video format", value, VIDEO_FORMATS)?;
                self.update(|cfg| cfg.default_video_format = value.to_string())
            }
            "default_audio_quality" => {
                let value = if value == LEGACY_AUDIO_QUALITY {
                    "320kb"
                } else {
                    value
                };
                check_choice("audio quality", value, AUDIO_QUALITIES)?;
                self.update(|cfg| cfg.default_audio_quality = value.to_string())
            }
            "default_video_quality" => {
                check_choice("video quality", value, VIDEO_QUALITIES)?;
                self.update(|cfg| cfg.default_video_quality = value.to_string())
            }
            "auto_delete_temp" => {
                let flag = parse_bool(key, value)?;
                self.update(|cfg| cfg.auto_delete_temp = flag)
            }
            "download_subtitles" => {
                let flag = parse_bool(key, value)?;
                self.update(|cfg| cfg.download_subtitles = flag)
            }
            "create_subfolders" => {
                let flag = parse_bool(key, value)?;
                self.update(|cfg| cfg.create_subfolders = flag)
            }
            "notification_sound" => {
                let flag = parse_bool(key, value)?;
                self.update(|cfg| cfg.notification_sound = flag)
            }
            "subtitle_languages" => {
                let languages: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_string)
                    .collect();
                self.update(|cfg| cfg.subtitle_languages = languages)
            }
            "max_concurrent_downloads" => {
                let count: usize = value.parse().map_err(|_| {
                    Error::Configuration(format!(
                        "max_concurrent_downloads must be a number, got '{value}'"
                    ))
                })?;
                let clamped = count.clamp(MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS);
                if clamped != count {
                    warn!(
                        context = "Config",
                        "max_concurrent_downloads {} clamped to {}", count, clamped
                    );
                }
                self.update(|cfg| cfg.max_concurrent_downloads = clamped)
            }
            "proxy_url" => self.update(|cfg| cfg.proxy_url = value.to_string()),
            "theme_color" => {
                check_choice("theme colour", value, THEME_COLORS)?;
                self.update(|cfg| cfg.theme_color = value.to_string())
            }
            "notification_sound_file" => {
                let sound = expand_user(Path::new(value));
                if !self.fs.is_file(&sound) {
                    return Err(Error::Configuration(format!(
                        "Sound file not found: {}",
                        sound.display()
                    )));
                }
                self.update(|cfg| cfg.notification_sound_file = sound)
            }
            other => Err(Error::Configuration(format!("Unknown config key '{other}'"))),
        }
    }

    /// Restore defaults and persist them.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be saved.
    pub fn reset(&self) -> Result<Arc<AppConfig>> {
        self.update(|cfg| *cfg = AppConfig::default())
    }

    fn prepare_directory(&self, value: &str) -> Result<PathBuf> {
        if value.is_empty() {
            return Err(Error::Configuration("Directory must not be empty".to_string()));
        }
        let dir = expand_user(Path::new(value));
        self.fs.create_dir_all(&dir)?;
        PathValidator::new(Arc::clone(&self.fs)).validate(&dir, true, true)
    }
}

fn read_config(fs: &dyn FileSystem, path: &Path) -> Result<Option<AppConfig>> {
    let content = match fs.read_to_string(path) {
        Ok(content) => content,
        Err(Error::FileSystem(FileSystemError::NotFound { .. })) => return Ok(None),
        Err(e) => {
            return Err(Error::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let mut config: AppConfig = serde_json::from_str(&content).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    config.sanitize();
    Ok(Some(config))
}

fn persist(fs: &dyn FileSystem, path: &Path, config: &AppConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs.write_atomic(path, &content)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fs::mock::MockFileSystem;
    use tempfile::TempDir;

    fn temp_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::load(temp_dir.path().join(CONFIG_FILE_NAME));
        (temp_dir, manager)
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let (temp_dir, manager) = temp_manager();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        assert!(path.exists());
        assert_eq!(*manager.snapshot(), AppConfig::default());

        let on_disk: AppConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, AppConfig::default());
    }

    #[test]
    fn test_legacy_audio_quality_is_migrated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"default_audio_quality": "320"}"#).unwrap();

        let manager = ConfigManager::load(&path);
        assert_eq!(manager.snapshot().default_audio_quality, "320kb");
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"audio_path": "/data/music", "theme_color": "green"}"#).unwrap();

        let config = ConfigManager::load(&path).snapshot();
        assert_eq!(config.audio_path, PathBuf::from("/data/music"));
        assert_eq!(config.theme_color, "green");
        assert_eq!(config.default_video_quality, "1080p");
        assert_eq!(config.subtitle_languages, vec!["en", "es"]);
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ this is not json").unwrap();

        let err = ConfigManager::try_load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigLoadError);

        let manager = ConfigManager::load(&path);
        assert_eq!(*manager.snapshot(), AppConfig::default());
        // The malformed file is left for the user to inspect.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ this is not json");
    }

    #[test]
    fn test_concurrency_is_clamped_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, r#"{"max_concurrent_downloads": 0}"#).unwrap();
        assert_eq!(ConfigManager::load(&path).snapshot().max_concurrent_downloads, 1);

        std::fs::write(&path, r#"{"max_concurrent_downloads": 32}"#).unwrap();
        assert_eq!(ConfigManager::load(&path).snapshot().max_concurrent_downloads, 8);
    }

    #[test]
    fn test_unknown_choice_is_reset_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"default_video_format": "avi"}"#).unwrap();

        assert_eq!(ConfigManager::load(&path).snapshot().default_video_format, "mp4");
    }

    #[test]
    fn test_update_produces_new_snapshot() {
        let (_dir, manager) = temp_manager();
        let before = manager.snapshot();

        let after = manager
            .update(|cfg| cfg.default_audio_format = "opus".to_string())
            .unwrap();

        assert_eq!(before.default_audio_format, "mp3");
        assert_eq!(after.default_audio_format, "opus");

        let reloaded = ConfigManager::load(manager.path());
        assert_eq!(reloaded.snapshot().default_audio_format, "opus");
    }

    #[test]
    fn test_update_rejects_invalid_config() {
        let (_dir, manager) = temp_manager();
        let err = manager
            .update(|cfg| cfg.default_video_quality = "4k".to_string())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(manager.snapshot().default_video_quality, "1080p");
    }

    #[test]
    fn test_set_validates_choices() {
        let (_dir, manager) = temp_manager();

        assert!(manager.set("default_audio_format", "flac").is_err());
        assert!(manager.set("theme_color", "purple").is_err());
        assert!(manager.set("no_such_key", "x").is_err());

        manager.set("default_video_quality", "720p").unwrap();
        manager.set("default_audio_quality", "320").unwrap();
        let config = manager.snapshot();
        assert_eq!(config.default_video_quality, "720p");
        assert_eq!(config.default_audio_quality, "320kb");
    }

    #[test]
    fn test_set_bools_languages_and_concurrency() {
        let (_dir, manager) = temp_manager();

        manager.set("download_subtitles", "off").unwrap();
        manager.set("subtitle_languages", "pt, en ,").unwrap();
        manager.set("max_concurrent_downloads", "20").unwrap();

        let config = manager.snapshot();
        assert!(!config.download_subtitles);
        assert_eq!(config.subtitle_languages, vec!["pt", "en"]);
        assert_eq!(config.max_concurrent_downloads, 8);

        assert!(manager.set("subtitle_languages", " , ").is_err());
        assert!(manager.set("auto_delete_temp", "maybe").is_err());
        assert!(manager.set("max_concurrent_downloads", "many").is_err());
    }

    #[test]
    fn test_set_directory_creates_and_validates() {
        let (temp_dir, manager) = temp_manager();
        let music = temp_dir.path().join("Music").join("New");

        manager
            .set("audio_path", music.to_str().unwrap())
            .unwrap();
        assert!(music.is_dir());
        assert_eq!(manager.snapshot().audio_path, music);
    }

    #[test]
    fn test_set_directory_rejects_read_only() {
        let fs = MockFileSystem::new();
        fs.add_dir("/media/ro");
        fs.set_read_only("/media/ro");
        let manager = ConfigManager::load_with_fs("/cfg/config.json", Arc::new(fs));

        let err = manager.set("video_path", "/media/ro").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_set_sound_file_must_exist() {
        let (temp_dir, manager) = temp_manager();
        assert!(manager.set("notification_sound_file", "/no/such.ogg").is_err());

        let sound = temp_dir.path().join("tick.ogg");
        std::fs::write(&sound, "ogg").unwrap();
        manager
            .set("notification_sound_file", sound.to_str().unwrap())
            .unwrap();
        assert_eq!(manager.snapshot().notification_sound_file, sound);
    }

    #[test]
    fn test_proxy_accessor() {
        let mut config = AppConfig::default();
        assert_eq!(config.proxy(), None);
        config.proxy_url = " socks5://127.0.0.1:9050 ".to_string();
        assert_eq!(config.proxy(), Some("socks5://127.0.0.1:9050"));
    }

    #[test]
    fn test_app_paths_layout() {
        let paths = AppPaths::new("/data/tubesaver");
        assert_eq!(paths.config_file(), PathBuf::from("/data/tubesaver/config.json"));
        assert_eq!(
            paths.history_file(),
            PathBuf::from("/data/tubesaver/history_online.json")
        );
        assert_eq!(paths.cookies_file(), PathBuf::from("/data/tubesaver/cookies.json"));
        assert_eq!(paths.cookies_export_file(), PathBuf::from("/data/tubesaver/cookies.txt"));
        assert_eq!(paths.log_dir(), PathBuf::from("/data/tubesaver/logs"));
        assert!(AppPaths::default_root().ends_with(APP_DIR_NAME));
    }
}
