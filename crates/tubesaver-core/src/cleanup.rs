//! Post-download sweep of partial and intermediate artifacts.
//!
//! After a successful extraction the engine may leave behind container
//! partials (`.webm`, `.mkv`), `.part`/`.temp` markers and per-format
//! fragments (`title.f251.webm`). The sweep is best-effort: individual
//! deletion failures are logged and skipped, and nothing is retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use tubesaver_core::cleanup::TempCleaner;
//!
//! let report = TempCleaner::default().cleanup(Path::new("/music"), "Song Title");
//! println!("{}", report.summary());
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs::{FileSystem, RealFileSystem};

/// Suffixes (after `{base}.`) that mark leftover files.
const LEFTOVER_SUFFIXES: &[&str] = &["webm", "mkv", "temp", "part"];

/// Result of a cleanup sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Files that were deleted.
    pub deleted: Vec<PathBuf>,
    /// Files that matched but could not be deleted, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    /// Whether every matching file was removed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Removed {} temporary files ({} failed)",
            self.deleted.len(),
            self.failed.len()
        )
    }
}

/// Build the leftover-file patterns anchored on `base_filename`.
fn leftover_patterns(base_filename: &str) -> Vec<Regex> {
    let base = regex::escape(base_filename);
    let mut sources: Vec<String> = LEFTOVER_SUFFIXES
        .iter()
        .map(|suffix| format!(r"^{base}\..*{suffix}$"))
        .collect();
    // Per-format fragments: "{base}.f<numeric format id>.<ext>[.part]".
    // Subtitles such as "{base}.fr.vtt" share the prefix and must survive.
    sources.push(format!(r"^{base}\.f\d+\..+$"));

    sources
        .iter()
        .filter_map(|source| match Regex::new(source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Skipping invalid cleanup pattern {}: {}", source, e);
                None
            }
        })
        .collect()
}

/// Best-effort remover of temporary download artifacts.
#[derive(Clone)]
pub struct TempCleaner {
    fs: Arc<dyn FileSystem>,
}

impl Default for TempCleaner {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl TempCleaner {
    /// Create a cleaner over the given file system.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Remove every leftover matching `base_filename` in `directory`.
    pub fn cleanup(&self, directory: &Path, base_filename: &str) -> CleanupReport {
        self.sweep(directory, base_filename, None)
    }

    /// Like [`cleanup`](Self::cleanup) but never removes `{base}.{keep_extension}`,
    /// the finished output when its container is itself a leftover suffix.
    pub fn cleanup_preserving(
        &self,
        directory: &Path,
        base_filename: &str,
        keep_extension: &str,
    ) -> CleanupReport {
        self.sweep(directory, base_filename, Some(keep_extension))
    }

    fn sweep(&self, directory: &Path, base_filename: &str, keep: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::default();

        let entries = match self.fs.read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    context = "Cleanup",
                    "Cannot list {} for cleanup: {}",
                    directory.display(),
                    e
                );
                return report;
            }
        };

        let patterns = leftover_patterns(base_filename);
        let kept_name = keep.map(|ext| format!("{base_filename}.{ext}"));

        let mut matches: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| self.fs.is_file(path))
            .filter(|path| {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    return false;
                };
                if kept_name.as_deref() == Some(name) {
                    return false;
                }
                patterns.iter().any(|re| re.is_match(name))
            })
            .collect();
        matches.sort();

        for path in matches {
            match self.fs.remove_file(&path) {
                Ok(()) => {
                    debug!("Removed temporary file {}", path.display());
                    report.deleted.push(path);
                }
                Err(e) => {
                    warn!(
                        context = "Cleanup",
                        "Error removing temporary file {}: {}",
                        path.display(),
                        e
                    );
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        if !report.deleted.is_empty() || !report.failed.is_empty() {
            info!("{}", report.summary());
        }
        report
    }
}
