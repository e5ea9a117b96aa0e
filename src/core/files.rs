//! File collaborator used by the steps.
//!
//! Steps never touch `std::fs` directly; they go through [`FileSystem`] so
//! tests can supply an in-memory implementation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub trait FileSystem {
    /// True when `path` is an existing regular file.
    fn exists(&self, path: &Path) -> Result<bool>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes `content`, applying `mode` (unix permission bits) when given.
    fn write(&self, path: &Path, content: &str, mode: Option<u32>) -> Result<()>;

    /// Permission bits of `path`, `None` on platforms without them.
    fn mode(&self, path: &Path) -> Result<Option<u32>>;

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64>;

    fn remove(&self, path: &Path) -> Result<()>;

    /// Paths matching a glob pattern, sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    fn current_dir(&self) -> Result<PathBuf>;
}

/// Local disk implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

fn io_error(err: std::io::Error, action: &str, path: &Path) -> Error {
    Error::internal_io(
        err.to_string(),
        Some(format!("{} {}", action, path.display())),
    )
}

impl FileSystem for LocalFiles {
    fn exists(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(err, "stat", path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::file_not_found(path.display().to_string(), None)
            } else {
                io_error(e, "read", path)
            }
        })
    }

    fn write(&self, path: &Path, content: &str, mode: Option<u32>) -> Result<()> {
        fs::write(path, content).map_err(|e| io_error(e, "write", path))?;
        if let Some(mode) = mode {
            self.set_mode(path, mode)?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn mode(&self, path: &Path) -> Result<Option<u32>> {
        use std::os::unix::fs::PermissionsExt;
        let meta = fs::metadata(path).map_err(|e| io_error(e, "stat", path))?;
        Ok(Some(meta.permissions().mode() & 0o7777))
    }

    #[cfg(not(unix))]
    fn mode(&self, path: &Path) -> Result<Option<u32>> {
        fs::metadata(path).map_err(|e| io_error(e, "stat", path))?;
        Ok(None)
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| io_error(e, "chmod", path))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<u64> {
        fs::copy(src, dst).map_err(|e| {
            Error::internal_io(
                e.to_string(),
                Some(format!("copy {} to {}", src.display(), dst.display())),
            )
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| io_error(e, "remove", path))
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let entries = glob::glob(pattern).map_err(|e| {
            Error::validation_invalid_argument(
                "pattern",
                format!("Invalid glob pattern '{}': {}", pattern, e),
                None,
            )
        })?;
        let mut paths: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).collect();
        paths.sort();
        Ok(paths)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("resolve working directory".into())))
    }
}
