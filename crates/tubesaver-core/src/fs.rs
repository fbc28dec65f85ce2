//! File system abstraction for testability.
//!
//! The path validator, history store, artifact resolver and temp cleaner all
//! go through [`FileSystem`] so permission and failure edge cases can be
//! exercised without touching the real disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use tubesaver_core::fs::{FileSystem, RealFileSystem};
//!
//! let fs = RealFileSystem;
//! fs.write_atomic(Path::new("history.json"), "[]")?;
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, FileSystemError, Result};

/// Converts an I/O error for read operations.
fn read_error(path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        return Error::FileSystem(FileSystemError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Error::FileSystem(FileSystemError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for write operations.
fn write_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::WriteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for directory creation.
fn create_dir_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CreateDirFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for delete operations.
fn delete_error(path: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::DeleteFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Converts an I/O error for copy operations.
fn copy_error(src: &Path, dst: &Path, e: io::Error) -> Error {
    Error::FileSystem(FileSystemError::CopyFailed {
        source_path: src.to_path_buf(),
        destination: dst.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Abstraction over file system operations for testability.
pub trait FileSystem: Send + Sync {
    /// Read a file's contents as a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replace a file's contents in one step (write sibling temp file, then rename).
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()>;

    /// Check if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Check if a path is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// List entries in a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Copy a file from src to dst.
    fn copy(&self, src: &Path, dst: &Path) -> Result<u64>;

    /// Whether the current process may read `path`.
    fn can_read(&self, path: &Path) -> io::Result<bool>;

    /// Whether the current process may write into `path`.
    fn can_write(&self, path: &Path) -> io::Result<bool>;
}

/// Real file system implementation using std::fs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    /// Create a new real file system instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
fn check_access(path: &Path, mode: nix::unistd::AccessFlags) -> io::Result<bool> {
    match nix::unistd::access(path, mode) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EACCES | nix::errno::Errno::EROFS | nix::errno::Errno::EPERM) => {
            Ok(false)
        }
        Err(nix::errno::Errno::ENOENT) => Ok(false),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| read_error(path, e))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, contents).map_err(|e| write_error(&tmp_path, e))?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            write_error(path, e)
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| create_dir_error(path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| delete_error(path, e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).map_err(|e| read_error(path, e))?;

        let paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        Ok(paths)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
        // Ensure parent directory exists
        if let Some(parent) = dst.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| create_dir_error(parent, e))?;
        }
        fs::copy(src, dst).map_err(|e| copy_error(src, dst, e))
    }

    #[cfg(unix)]
    fn can_read(&self, path: &Path) -> io::Result<bool> {
        check_access(path, nix::unistd::AccessFlags::R_OK)
    }

    #[cfg(unix)]
    fn can_write(&self, path: &Path) -> io::Result<bool> {
        check_access(path, nix::unistd::AccessFlags::W_OK)
    }

    #[cfg(not(unix))]
    fn can_read(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(unix))]
    fn can_write(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(!meta.permissions().readonly()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
