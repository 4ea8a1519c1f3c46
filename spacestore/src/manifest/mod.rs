//! Manifest: the immutable, versioned catalog of a Space
//!
//! A manifest names every live file of the Space at one version: the
//! schema with its roles, the scalar/vector/delete fragment lists, and the
//! blob entries. Mutation never happens in place; a writer clones the
//! current manifest, edits the clone, bumps the version, and publishes it
//! through [`store::save_manifest`]'s atomic rename.

use serde::{Deserialize, Serialize};

use crate::schema::{SchemaRepr, SpaceSchema};
use crate::{Result, SpaceError};

pub mod store;

/// A group of data files introduced by one write (or delete) call. The id
/// equals the manifest version that introduced the fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    id: i64,
    files: Vec<String>,
}

impl Fragment {
    pub fn new(id: i64) -> Self {
        Self { id, files: Vec::new() }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    pub fn add_file(&mut self, path: String) {
        self.files.push(path);
    }

    /// Space-root-relative file paths, in write order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A named opaque payload registered in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub name: String,
    pub size: i64,
    pub file: String,
}

/// Point-in-time catalog of a Space. Identity is the version; comparison
/// is structural.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    schema: SpaceSchema,
    scalar_fragments: Vec<Fragment>,
    vector_fragments: Vec<Fragment>,
    delete_fragments: Vec<Fragment>,
    blobs: Vec<BlobEntry>,
    version: i64,
}

impl Manifest {
    /// Fresh manifest at version 0 for a newly created Space.
    pub fn new(schema: SpaceSchema) -> Self {
        Self {
            schema,
            scalar_fragments: Vec::new(),
            vector_fragments: Vec::new(),
            delete_fragments: Vec::new(),
            blobs: Vec::new(),
            version: 0,
        }
    }

    pub fn schema(&self) -> &SpaceSchema {
        &self.schema
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    pub fn scalar_fragments(&self) -> &[Fragment] {
        &self.scalar_fragments
    }

    pub fn vector_fragments(&self) -> &[Fragment] {
        &self.vector_fragments
    }

    pub fn delete_fragments(&self) -> &[Fragment] {
        &self.delete_fragments
    }

    pub fn add_scalar_fragment(&mut self, fragment: Fragment) {
        self.scalar_fragments.push(fragment);
    }

    pub fn add_vector_fragment(&mut self, fragment: Fragment) {
        self.vector_fragments.push(fragment);
    }

    pub fn add_delete_fragment(&mut self, fragment: Fragment) {
        self.delete_fragments.push(fragment);
    }

    pub fn vector_fragment_by_id(&self, id: i64) -> Option<&Fragment> {
        self.vector_fragments.iter().find(|f| f.id() == id)
    }

    pub fn blobs(&self) -> &[BlobEntry] {
        &self.blobs
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.iter().any(|b| b.name == name)
    }

    pub fn get_blob(&self, name: &str) -> Option<&BlobEntry> {
        self.blobs.iter().find(|b| b.name == name)
    }

    /// Register a blob entry. A same-named entry is replaced, keeping blob
    /// names unique within one manifest.
    pub fn add_blob(&mut self, blob: BlobEntry) {
        if let Some(existing) = self.blobs.iter_mut().find(|b| b.name == blob.name) {
            *existing = blob;
        } else {
            self.blobs.push(blob);
        }
    }

    pub fn to_repr(&self) -> Result<ManifestRepr> {
        Ok(ManifestRepr {
            version: self.version,
            schema: self.schema.to_repr()?,
            scalar_fragments: self.scalar_fragments.clone(),
            vector_fragments: self.vector_fragments.clone(),
            delete_fragments: self.delete_fragments.clone(),
            blobs: self.blobs.clone(),
        })
    }

    pub fn from_repr(repr: ManifestRepr) -> Result<Self> {
        let schema = SpaceSchema::from_repr(repr.schema)
            .map_err(|e| SpaceError::ManifestCorrupt(e.to_string()))?;
        Ok(Self {
            schema,
            scalar_fragments: repr.scalar_fragments,
            vector_fragments: repr.vector_fragments,
            delete_fragments: repr.delete_fragments,
            blobs: repr.blobs,
            version: repr.version,
        })
    }
}

/// Wire form of a manifest. Unknown trailing fields in a stored manifest
/// are ignored on load, so newer writers stay readable by older code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRepr {
    pub version: i64,
    pub schema: SchemaRepr,
    #[serde(default)]
    pub scalar_fragments: Vec<Fragment>,
    #[serde(default)]
    pub vector_fragments: Vec<Fragment>,
    #[serde(default)]
    pub delete_fragments: Vec<Fragment>,
    #[serde(default)]
    pub blobs: Vec<BlobEntry>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;
    use crate::schema::SchemaOptions;

    fn space_schema() -> SpaceSchema {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pk", DataType::Int64, false),
            Field::new("ver", DataType::Int64, false),
            Field::new(
                "vec",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), 4),
                false,
            ),
        ]));
        SpaceSchema::try_new(
            schema,
            SchemaOptions::new("pk", "vec").with_version_column("ver"),
        )
        .unwrap()
    }

    fn sample_manifest() -> Manifest {
        let mut m = Manifest::new(space_schema());
        m.set_version(3);
        let mut scalar = Fragment::new(3);
        scalar.add_file("scalar/a.arrow".to_string());
        let mut vector = Fragment::new(3);
        vector.add_file("vector/b.arrow".to_string());
        m.add_scalar_fragment(scalar);
        m.add_vector_fragment(vector);
        let mut del = Fragment::new(3);
        del.add_file("delete/c.arrow".to_string());
        m.add_delete_fragment(del);
        m.add_blob(BlobEntry {
            name: "greet".to_string(),
            size: 5,
            file: "blob/d".to_string(),
        });
        m
    }

    #[test]
    fn test_serde_roundtrip_structural_equality() {
        let m = sample_manifest();
        let json = serde_json::to_vec(&m.to_repr().unwrap()).unwrap();
        let repr: ManifestRepr = serde_json::from_slice(&json).unwrap();
        let back = Manifest::from_repr(repr).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn test_unknown_trailing_fields_ignored() {
        let mut value = serde_json::to_value(sample_manifest().to_repr().unwrap()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("future_extension".to_string(), serde_json::json!({"x": 1}));
        let repr: ManifestRepr = serde_json::from_value(value).unwrap();
        assert_eq!(Manifest::from_repr(repr).unwrap(), sample_manifest());
    }

    #[test]
    fn test_blob_replace_keeps_names_unique() {
        let mut m = sample_manifest();
        m.add_blob(BlobEntry {
            name: "greet".to_string(),
            size: 9,
            file: "blob/e".to_string(),
        });
        assert_eq!(m.blobs().len(), 1);
        assert_eq!(m.get_blob("greet").unwrap().size, 9);
    }

    #[test]
    fn test_fragment_lookup_by_id() {
        let m = sample_manifest();
        assert!(m.vector_fragment_by_id(3).is_some());
        assert!(m.vector_fragment_by_id(4).is_none());
    }
}
