//! Local and online playback through an external player.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Default player executable.
pub const DEFAULT_PLAYER: &str = "mpv";

/// Extensions listed by [`AudioLibrary`].
pub const LIBRARY_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "opus", "ogg", "wav", "flac"];

/// Locate an executable on `PATH`.
#[must_use]
pub fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|full| full.is_file())
}

/// Exit status of a player process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerExit {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
}

impl PlayerExit {
    /// Whether the player exited cleanly.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs a player on a path or URL, blocking until it exits.
#[cfg_attr(test, mockall::automock)]
pub trait PlaybackRunner: Send + Sync {
    /// Whether the player is installed.
    fn is_available(&self) -> bool;

    /// Play `target` and wait for the player to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if the player cannot be started.
    fn play(&self, target: &str) -> Result<PlayerExit>;
}

/// [`PlaybackRunner`] backed by `mpv`.
#[derive(Debug, Clone)]
pub struct MpvRunner {
    program: String,
}

impl Default for MpvRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER)
    }
}

impl MpvRunner {
    /// Use a specific player executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PlaybackRunner for MpvRunner {
    fn is_available(&self) -> bool {
        find_program(&self.program).is_some()
    }

    fn play(&self, target: &str) -> Result<PlayerExit> {
        info!("Playing {}", target);
        let status = Command::new(&self.program)
            .arg(target)
            .stdin(Stdio::inherit())
            .status()
            .map_err(|e| Error::Playback(format!("failed to start {}: {e}", self.program)))?;
        debug!("Player exited with {}", status);
        Ok(PlayerExit {
            code: status.code(),
        })
    }
}

/// Downloaded audio files under a directory.
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    root: PathBuf,
}

impl AudioLibrary {
    /// Library rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every audio file, recursively, sorted by path.
    #[must_use]
    pub fn list(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| is_library_file(path))
            .collect();
        files.sort();
        files
    }

    /// Path relative to the library root, for display.
    #[must_use]
    pub fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Whether `path` has one of the [`LIBRARY_EXTENSIONS`].
#[must_use]
pub fn is_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LIBRARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
