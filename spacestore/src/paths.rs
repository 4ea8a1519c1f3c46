//! Path derivation for a Space directory
//!
//! Data file names are random and carry no meaning; fragment membership in
//! the manifest is the only authority. Only manifest file names encode
//! state (the version), and only they are ever parsed.

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const MANIFEST_DIR: &str = "manifest";
pub const SCALAR_DIR: &str = "scalar";
pub const VECTOR_DIR: &str = "vector";
pub const DELETE_DIR: &str = "delete";
pub const BLOB_DIR: &str = "blob";

const MANIFEST_EXT: &str = "mf";
const TMP_SUFFIX: &str = "tmp";
const DATA_EXT: &str = "arrow";

pub fn manifest_dir(root: &Path) -> PathBuf {
    root.join(MANIFEST_DIR)
}

pub fn scalar_dir(root: &Path) -> PathBuf {
    root.join(SCALAR_DIR)
}

pub fn vector_dir(root: &Path) -> PathBuf {
    root.join(VECTOR_DIR)
}

pub fn delete_dir(root: &Path) -> PathBuf {
    root.join(DELETE_DIR)
}

pub fn blob_dir(root: &Path) -> PathBuf {
    root.join(BLOB_DIR)
}

pub fn manifest_file_path(root: &Path, version: i64) -> PathBuf {
    manifest_dir(root).join(format!("{version}.{MANIFEST_EXT}"))
}

pub fn manifest_tmp_file_path(root: &Path, version: i64) -> PathBuf {
    manifest_dir(root).join(format!("{version}.{MANIFEST_EXT}.{TMP_SUFFIX}"))
}

/// Extract the version from a committed manifest file name
/// (`<version>.mf`). Anything else, including `.mf.tmp` leftovers, yields
/// `None` and is skipped by directory scans.
pub fn parse_version_from_file_name(name: &str) -> Option<i64> {
    let version = name.strip_suffix(&format!(".{MANIFEST_EXT}"))?;
    version.parse::<i64>().ok().filter(|v| *v >= 0)
}

fn new_data_file_name() -> String {
    format!("{}.{}", Uuid::new_v4().simple(), DATA_EXT)
}

/// Fresh root-relative scalar data file path.
pub fn new_scalar_file(root: &Path) -> (String, PathBuf) {
    let rel = format!("{}/{}", SCALAR_DIR, new_data_file_name());
    let full = root.join(&rel);
    (rel, full)
}

/// Fresh root-relative vector data file path.
pub fn new_vector_file(root: &Path) -> (String, PathBuf) {
    let rel = format!("{}/{}", VECTOR_DIR, new_data_file_name());
    let full = root.join(&rel);
    (rel, full)
}

/// Fresh root-relative delete data file path.
pub fn new_delete_file(root: &Path) -> (String, PathBuf) {
    let rel = format!("{}/{}", DELETE_DIR, new_data_file_name());
    let full = root.join(&rel);
    (rel, full)
}

/// Fresh root-relative blob payload path. Blobs are opaque, no extension.
pub fn new_blob_file(root: &Path) -> (String, PathBuf) {
    let rel = format!("{}/{}", BLOB_DIR, Uuid::new_v4().simple());
    let full = root.join(&rel);
    (rel, full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version_from_file_name("0.mf"), Some(0));
        assert_eq!(parse_version_from_file_name("42.mf"), Some(42));
        assert_eq!(parse_version_from_file_name("42.mf.tmp"), None);
        assert_eq!(parse_version_from_file_name("abc.mf"), None);
        assert_eq!(parse_version_from_file_name("-1.mf"), None);
        assert_eq!(parse_version_from_file_name("data.arrow"), None);
    }

    #[test]
    fn test_manifest_paths_agree_with_parser() {
        let root = Path::new("/tmp/s");
        let committed = manifest_file_path(root, 7);
        let name = committed.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_version_from_file_name(name), Some(7));

        let tmp = manifest_tmp_file_path(root, 7);
        let name = tmp.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_version_from_file_name(name), None);
    }

    #[test]
    fn test_data_file_names_unique() {
        let root = Path::new("/tmp/s");
        let (a, _) = new_scalar_file(root);
        let (b, _) = new_scalar_file(root);
        assert_ne!(a, b);
        assert!(a.starts_with("scalar/"));
        assert!(a.ends_with(".arrow"));
    }
}
