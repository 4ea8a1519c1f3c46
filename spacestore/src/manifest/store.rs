//! Manifest persistence
//!
//! Committed manifests live at `manifest/<version>.mf`. A save writes the
//! serialized bytes to `<version>.mf.tmp` and renames it into place; the
//! rename is the publication point. A failed rename leaves the temp file
//! for an external sweeper and the manifest unpublished.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::{Manifest, ManifestRepr};
use crate::fs::FileSystem;
use crate::paths;
use crate::{Result, SpaceError};

/// Enumerate committed manifests of a Space, ascending by version. Names
/// that do not parse as `<version>.mf` (temp files, strays) are skipped.
pub fn list_manifests(fs: &dyn FileSystem, root: &Path) -> Result<Vec<(i64, PathBuf)>> {
    let dir = paths::manifest_dir(root);
    let mut found = Vec::new();
    for entry in fs.list(&dir)? {
        let Some(name) = entry.path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(version) = paths::parse_version_from_file_name(name) {
            found.push((version, entry.path));
        }
    }
    found.sort_by_key(|(version, _)| *version);
    Ok(found)
}

/// Load and decode one manifest file. The version declared inside must
/// match the version in the file name.
pub fn load_manifest(fs: &dyn FileSystem, path: &Path) -> Result<Manifest> {
    let file_version = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(paths::parse_version_from_file_name)
        .ok_or_else(|| {
            SpaceError::ManifestCorrupt(format!("unparseable manifest name {}", path.display()))
        })?;

    let mut bytes = Vec::new();
    fs.open_read(path)?.read_to_end(&mut bytes)?;
    let repr: ManifestRepr = serde_json::from_slice(&bytes)
        .map_err(|e| SpaceError::ManifestCorrupt(format!("{}: {e}", path.display())))?;
    let manifest = Manifest::from_repr(repr)?;

    if manifest.version() != file_version {
        return Err(SpaceError::ManifestCorrupt(format!(
            "{} declares version {} but is named {}",
            path.display(),
            manifest.version(),
            file_version
        )));
    }
    Ok(manifest)
}

/// Persist a manifest: serialize to the temp path, then rename to the
/// committed path for `manifest.version()`.
pub fn save_manifest(fs: &dyn FileSystem, root: &Path, manifest: &Manifest) -> Result<()> {
    let tmp_path = paths::manifest_tmp_file_path(root, manifest.version());
    let final_path = paths::manifest_file_path(root, manifest.version());

    let bytes = serde_json::to_vec(&manifest.to_repr()?)
        .map_err(|e| SpaceError::ManifestCorrupt(e.to_string()))?;
    {
        let mut out = fs.open_write(&tmp_path)?;
        out.write_all(&bytes)?;
        out.flush()?;
    }
    fs.rename(&tmp_path, &final_path)?;
    debug!("saved manifest version {} at {}", manifest.version(), final_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};
    use tempfile::tempdir;

    use super::*;
    use crate::fs::LocalFileSystem;
    use crate::schema::{SchemaOptions, SpaceSchema};

    fn space_schema() -> SpaceSchema {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pk", DataType::Int64, false),
            Field::new(
                "vec",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), 2),
                false,
            ),
        ]));
        SpaceSchema::try_new(schema, SchemaOptions::new("pk", "vec")).unwrap()
    }

    fn manifest_at(version: i64) -> Manifest {
        let mut m = Manifest::new(space_schema());
        m.set_version(version);
        m
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;
        fs.create_dir(&paths::manifest_dir(dir.path())).unwrap();

        let m = manifest_at(2);
        save_manifest(&fs, dir.path(), &m).unwrap();

        let path = paths::manifest_file_path(dir.path(), 2);
        let loaded = load_manifest(&fs, &path).unwrap();
        assert_eq!(loaded, m);
    }

    #[test]
    fn test_list_sorts_and_skips_strays() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;
        fs.create_dir(&paths::manifest_dir(dir.path())).unwrap();

        for version in [3, 0, 1] {
            save_manifest(&fs, dir.path(), &manifest_at(version)).unwrap();
        }
        // leftovers that must be invisible
        for name in ["5.mf.tmp", "notes.txt"] {
            let mut f = fs
                .open_write(&paths::manifest_dir(dir.path()).join(name))
                .unwrap();
            f.write_all(b"junk").unwrap();
        }

        let listed = list_manifests(&fs, dir.path()).unwrap();
        let versions: Vec<i64> = listed.iter().map(|(v, _)| *v).collect();
        assert_eq!(versions, vec![0, 1, 3]);
    }

    #[test]
    fn test_version_name_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;
        fs.create_dir(&paths::manifest_dir(dir.path())).unwrap();

        let bytes = serde_json::to_vec(&manifest_at(9).to_repr().unwrap()).unwrap();
        let path = paths::manifest_file_path(dir.path(), 1);
        fs.open_write(&path).unwrap().write_all(&bytes).unwrap();

        assert!(matches!(
            load_manifest(&fs, &path),
            Err(SpaceError::ManifestCorrupt(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_are_corrupt() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;
        fs.create_dir(&paths::manifest_dir(dir.path())).unwrap();

        let path = paths::manifest_file_path(dir.path(), 0);
        fs.open_write(&path).unwrap().write_all(b"not json").unwrap();

        assert!(matches!(
            load_manifest(&fs, &path),
            Err(SpaceError::ManifestCorrupt(_))
        ));
    }
}
