//! Filesystem path validation performed before any write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{PathError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_user(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Stateless existence/permission checks.
#[derive(Clone)]
pub struct PathValidator {
    fs: Arc<dyn FileSystem>,
}

impl Default for PathValidator {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl std::fmt::Debug for PathValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathValidator").finish_non_exhaustive()
    }
}

impl PathValidator {
    /// Create a validator over the given file system.
    #[must_use]
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Validate `path`, returning its absolute, user-expanded form.
    ///
    /// With `need_write` the directory itself (or the parent of a file) must
    /// be writable; otherwise the path itself must be readable.
    pub fn validate(&self, path: &Path, must_exist: bool, need_write: bool) -> Result<PathBuf> {
        let resolved = std::path::absolute(expand_user(path)).map_err(|e| PathError::Unexpected {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if must_exist && !self.fs.exists(&resolved) {
            return Err(PathError::NotFound { path: resolved }.into());
        }

        let (target, access) = if need_write {
            let target = if self.fs.is_dir(&resolved) {
                resolved.clone()
            } else {
                resolved
                    .parent()
                    .map_or_else(|| resolved.clone(), Path::to_path_buf)
            };
            (target, "write")
        } else {
            (resolved.clone(), "read")
        };

        let allowed = if need_write {
            self.fs.can_write(&target)
        } else {
            self.fs.can_read(&target)
        }
        .map_err(|e| PathError::Unexpected {
            path: resolved.clone(),
            reason: e.to_string(),
        })?;

        if !allowed {
            return Err(PathError::PermissionDenied {
                path: target,
                access,
            }
            .into());
        }

        debug!(path = %resolved.display(), need_write, "path validated");
        Ok(resolved)
    }
}
