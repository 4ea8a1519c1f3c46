//! Local filesystem backend

use std::fs::{self, File};
use std::path::Path;

use super::{FileEntry, FileSystem, FsRead, FsWrite};

/// `std::fs` backed filesystem. `rename(2)` on one directory is atomic,
/// which is all the manifest swap needs.
#[derive(Debug)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn create_dir(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path)
    }

    fn open_write(&self, path: &Path) -> std::io::Result<Box<dyn FsWrite>> {
        Ok(Box::new(File::create(path)?))
    }

    fn open_read(&self, path: &Path) -> std::io::Result<Box<dyn FsRead>> {
        Ok(Box::new(File::open(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        fs::rename(from, to)
    }

    fn list(&self, dir: &Path) -> std::io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(FileEntry { path: entry.path() });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_local_roundtrip() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;

        let sub = dir.path().join("a/b");
        fs.create_dir(&sub).unwrap();
        fs.create_dir(&sub).unwrap(); // idempotent

        let file = sub.join("x.bin");
        {
            let mut w = fs.open_write(&file).unwrap();
            w.write_all(b"hello").unwrap();
        }

        let renamed = sub.join("y.bin");
        fs.rename(&file, &renamed).unwrap();

        let mut buf = String::new();
        fs.open_read(&renamed).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");

        let listed = fs.list(&sub).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, renamed);
    }
}
