//! File-system primitives
//!
//! The configuration backup protocol only needs a handful of non-throwing
//! primitives. Every operation reports success through its return value and
//! logs the underlying I/O error at `debug` level, so callers can chain them
//! the same way regardless of which implementation is plugged in.

use std::path::Path;

/// Non-throwing file-system primitives
pub trait FileSystem {
    /// Copy `src` over `dst`. Fails when `src` cannot be read.
    fn copy_file(&self, src: &Path, dst: &Path) -> bool;

    /// Delete the file at `path`
    fn delete_file(&self, path: &Path) -> bool;

    /// Create a directory and any missing parents. Succeeds if it already exists.
    fn create_directory(&self, path: &Path) -> bool;

    /// Write `contents` to `path`, replacing any existing file
    fn write_file(&self, path: &Path, contents: &str) -> bool;

    /// Read the whole file at `path` as UTF-8
    fn read_file(&self, path: &Path) -> Option<String>;

    /// Whether a file exists at `path`
    fn exists(&self, path: &Path) -> bool;
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn copy_file(&self, src: &Path, dst: &Path) -> bool {
        std::fs::copy(src, dst)
            .map_err(|e| log::debug!("copy '{}' -> '{}' failed: {}", src.display(), dst.display(), e))
            .is_ok()
    }

    fn delete_file(&self, path: &Path) -> bool {
        std::fs::remove_file(path)
            .map_err(|e| log::debug!("delete '{}' failed: {}", path.display(), e))
            .is_ok()
    }

    fn create_directory(&self, path: &Path) -> bool {
        std::fs::create_dir_all(path)
            .map_err(|e| log::debug!("create directory '{}' failed: {}", path.display(), e))
            .is_ok()
    }

    fn write_file(&self, path: &Path, contents: &str) -> bool {
        std::fs::write(path, contents)
            .map_err(|e| log::debug!("write '{}' failed: {}", path.display(), e))
            .is_ok()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path)
            .map_err(|e| log::debug!("read '{}' failed: {}", path.display(), e))
            .ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
