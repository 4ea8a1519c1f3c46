//! Filesystem abstraction
//!
//! The store only needs a handful of operations: idempotent directory
//! creation, whole-file reads and writes, an atomic same-directory rename,
//! and directory listing. Which implementation backs a Space is decided by
//! the URI it is opened with (`file://...` or a bare path select the local
//! filesystem); an object-store implementation plugs in behind the same
//! trait.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Result, SpaceError};

mod local;

pub use local::LocalFileSystem;

/// Writable file handle
pub trait FsWrite: Write + Send {}
impl<T: Write + Send> FsWrite for T {}

/// Readable, seekable file handle
pub trait FsRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> FsRead for T {}

/// A directory listing entry
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
}

pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Create a directory and its parents. Succeeds if it already exists.
    fn create_dir(&self, path: &Path) -> std::io::Result<()>;

    /// Open a file for writing, truncating any existing content.
    fn open_write(&self, path: &Path) -> std::io::Result<Box<dyn FsWrite>>;

    /// Open a file for reading.
    fn open_read(&self, path: &Path) -> std::io::Result<Box<dyn FsRead>>;

    /// Rename `from` to `to`. Must be atomic within one directory.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// List the plain files of a directory (non-recursive).
    fn list(&self, dir: &Path) -> std::io::Result<Vec<FileEntry>>;
}

/// Resolve a Space URI to a filesystem implementation and a root path.
///
/// `file:///data/s1` and `/data/s1` both select [`LocalFileSystem`] rooted
/// at `/data/s1`. Any other scheme is rejected.
pub fn build_filesystem(uri: &str) -> Result<(Arc<dyn FileSystem>, PathBuf)> {
    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            return Err(SpaceError::InvalidUri(uri.to_string()));
        }
        return Ok((Arc::new(LocalFileSystem), PathBuf::from(path)));
    }
    if uri.contains("://") {
        return Err(SpaceError::InvalidUri(uri.to_string()));
    }
    if uri.is_empty() {
        return Err(SpaceError::InvalidUri(uri.to_string()));
    }
    Ok((Arc::new(LocalFileSystem), PathBuf::from(uri)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filesystem_schemes() {
        assert!(build_filesystem("file:///tmp/s1").is_ok());
        assert!(build_filesystem("/tmp/s1").is_ok());
        assert!(build_filesystem("relative/dir").is_ok());
        assert!(matches!(
            build_filesystem("s3://bucket/s1"),
            Err(SpaceError::InvalidUri(_))
        ));
        assert!(matches!(
            build_filesystem(""),
            Err(SpaceError::InvalidUri(_))
        ));
    }

    #[test]
    fn test_file_uri_strips_scheme() {
        let (_, root) = build_filesystem("file:///data/space").unwrap();
        assert_eq!(root, PathBuf::from("/data/space"));
    }
}
