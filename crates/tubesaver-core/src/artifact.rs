//! Detection of previously downloaded output files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fs::{FileSystem, RealFileSystem};

/// Audio extensions probed after the configured one.
pub const AUDIO_FALLBACK_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "opus", "ogg", "wav", "flac"];

/// Video extensions probed after the configured one.
pub const VIDEO_FALLBACK_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];

/// Build a candidate list `[preferred, ...fallbacks]` without duplicates.
#[must_use]
pub fn candidate_extensions(preferred: &str, fallbacks: &[&str]) -> Vec<String> {
    let mut extensions = vec![preferred.to_string()];
    extensions.extend(
        fallbacks
            .iter()
            .filter(|ext| **ext != preferred)
            .map(|ext| (*ext).to_string()),
    );
    extensions
}

/// Read-only probe for `{title}.{ext}` files.
#[derive(Clone)]
pub struct ArtifactResolver {
    fs: Arc<dyn FileSystem>,
}

impl Default for ArtifactResolver {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl ArtifactResolver {
    /// Create a resolver over the given file system.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// First existing `{title}.{ext}` in `directory`, in extension order.
    pub fn find_existing<S: AsRef<str>>(
        &self,
        directory: &Path,
        title: &str,
        candidate_extensions: &[S],
    ) -> Option<PathBuf> {
        candidate_extensions
            .iter()
            .map(|ext| directory.join(format!("{title}.{}", ext.as_ref())))
            .find(|candidate| self.fs.exists(candidate))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_earlier_extension_wins() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("title.wav"), "w").unwrap();
        std::fs::write(temp_dir.path().join("title.m4a"), "m").unwrap();

        let found = ArtifactResolver::default().find_existing(
            temp_dir.path(),
            "title",
            &["mp3", "m4a", "wav"],
        );
        assert_eq!(found, Some(temp_dir.path().join("title.m4a")));
    }

    #[test]
    fn test_no_match() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("other.mp3"), "x").unwrap();

        let found =
            ArtifactResolver::default().find_existing(temp_dir.path(), "title", &["mp3"]);
        assert!(found.is_none());
    }

    #[test]
    fn test_title_with_spaces() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("Song Title.mp3"), "x").unwrap();

        let extensions = candidate_extensions("mp3", AUDIO_FALLBACK_EXTENSIONS);
        let found =
            ArtifactResolver::default().find_existing(temp_dir.path(), "Song Title", &extensions);
        assert_eq!(found, Some(temp_dir.path().join("Song Title.mp3")));
    }

    #[test]
    fn test_candidate_extensions_preferred_first_without_duplicates() {
        let extensions = candidate_extensions("m4a", AUDIO_FALLBACK_EXTENSIONS);
        assert_eq!(extensions[0], "m4a");
        assert_eq!(extensions.iter().filter(|e| *e == "m4a").count(), 1);
        assert_eq!(extensions.len(), AUDIO_FALLBACK_EXTENSIONS.len());

        let extensions = candidate_extensions("vorbis", AUDIO_FALLBACK_EXTENSIONS);
        assert_eq!(extensions.len(), AUDIO_FALLBACK_EXTENSIONS.len() + 1);
    }
}
