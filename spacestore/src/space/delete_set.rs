//! Delete set: primary key -> versions deleted at
//!
//! Built on demand from every delete fragment of a manifest snapshot. A
//! row with key K and version V stays visible while the newest recorded
//! delete for K is older than V; without a version column, any tombstone
//! for K hides every row with that key.

use std::path::Path;

use ahash::AHashMap;
use arrow::array::{Array, BooleanArray, BooleanBuilder, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::format;
use crate::fs::FileSystem;
use crate::manifest::Manifest;
use crate::{Result, SpaceError};

/// Primary key value. The supported physical key types are a closed set;
/// extending it means extending this enum and the one dispatch point in
/// [`DeleteSet::add_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PkValue {
    Int64(i64),
    Utf8(String),
}

#[derive(Debug, Default)]
pub struct DeleteSet {
    data: AHashMap<PkValue, Vec<i64>>,
}

impl DeleteSet {
    /// Stream every delete fragment of `manifest` into a fresh set.
    pub fn build(fs: &dyn FileSystem, root: &Path, manifest: &Manifest) -> Result<Self> {
        let mut set = DeleteSet::default();
        let schema = manifest.schema();
        for fragment in manifest.delete_fragments() {
            for file in fragment.files() {
                let reader = format::open_record_reader(fs, &root.join(file))?;
                for batch in reader {
                    set.add_batch(&batch?, schema.primary_column(), schema.version_column())?;
                }
            }
        }
        Ok(set)
    }

    /// Fold one tombstone batch in. `pk_column` supplies keys,
    /// `version_column` (when present) supplies the deleted-at versions.
    pub fn add_batch(
        &mut self,
        batch: &RecordBatch,
        pk_column: &str,
        version_column: Option<&str>,
    ) -> Result<()> {
        let keys = batch
            .column_by_name(pk_column)
            .ok_or_else(|| SpaceError::ColumnNotFound(pk_column.to_string()))?;

        let versions = match version_column {
            Some(name) => {
                let col = batch
                    .column_by_name(name)
                    .ok_or_else(|| SpaceError::ColumnNotFound(name.to_string()))?;
                Some(
                    col.as_any()
                        .downcast_ref::<Int64Array>()
                        .ok_or_else(|| {
                            SpaceError::ManifestCorrupt(format!(
                                "delete file version column {name} is not int64"
                            ))
                        })?
                        .clone(),
                )
            }
            None => None,
        };

        // single dispatch point over the supported key types
        match keys.data_type() {
            DataType::Int64 => {
                let keys = keys.as_any().downcast_ref::<Int64Array>().ok_or_else(|| {
                    SpaceError::ManifestCorrupt("delete key column type mismatch".to_string())
                })?;
                for i in 0..keys.len() {
                    self.insert(PkValue::Int64(keys.value(i)), versions.as_ref().map(|v| v.value(i)));
                }
            }
            DataType::Utf8 => {
                let keys = keys.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                    SpaceError::ManifestCorrupt("delete key column type mismatch".to_string())
                })?;
                for i in 0..keys.len() {
                    self.insert(
                        PkValue::Utf8(keys.value(i).to_string()),
                        versions.as_ref().map(|v| v.value(i)),
                    );
                }
            }
            other => {
                return Err(SpaceError::ManifestCorrupt(format!(
                    "unsupported delete key type {other}"
                )))
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: PkValue, version: Option<i64>) {
        let versions = self.data.entry(key).or_default();
        if let Some(v) = version {
            versions.push(v);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Versions at which `key` was deleted, in tombstone order.
    pub fn versions(&self, key: &PkValue) -> &[i64] {
        self.data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Visibility rule. `row_version` is `None` for schemas without a
    /// version column. A tombstoned key with no recorded versions hides
    /// the key unconditionally.
    pub fn is_visible(&self, key: &PkValue, row_version: Option<i64>) -> bool {
        match self.data.get(key) {
            None => true,
            Some(versions) => match row_version {
                Some(v) => versions.iter().max().map_or(false, |newest| *newest < v),
                None => false,
            },
        }
    }

    /// Row mask over a merged batch: true keeps the row.
    pub fn mask(
        &self,
        batch: &RecordBatch,
        pk_column: &str,
        version_column: Option<&str>,
    ) -> Result<BooleanArray> {
        let keys = batch
            .column_by_name(pk_column)
            .ok_or_else(|| SpaceError::ColumnNotFound(pk_column.to_string()))?;
        let versions = match version_column {
            Some(name) => batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<Int64Array>().cloned()),
            None => None,
        };

        let mut builder = BooleanBuilder::with_capacity(batch.num_rows());
        match keys.data_type() {
            DataType::Int64 => {
                let keys = keys.as_any().downcast_ref::<Int64Array>().ok_or_else(|| {
                    SpaceError::ManifestCorrupt("primary key column type mismatch".to_string())
                })?;
                for i in 0..keys.len() {
                    let row_version = versions.as_ref().map(|v| v.value(i));
                    builder.append_value(self.is_visible(&PkValue::Int64(keys.value(i)), row_version));
                }
            }
            DataType::Utf8 => {
                let keys = keys.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                    SpaceError::ManifestCorrupt("primary key column type mismatch".to_string())
                })?;
                for i in 0..keys.len() {
                    let row_version = versions.as_ref().map(|v| v.value(i));
                    builder.append_value(
                        self.is_visible(&PkValue::Utf8(keys.value(i).to_string()), row_version),
                    );
                }
            }
            other => {
                return Err(SpaceError::ManifestCorrupt(format!(
                    "unsupported primary key type {other}"
                )))
            }
        }
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{Field, Schema};

    use super::*;

    fn tombstones(pks: &[i64], vers: &[i64]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("pk", DataType::Int64, false),
            Field::new("ver", DataType::Int64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(pks.to_vec())),
                Arc::new(Int64Array::from(vers.to_vec())),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_versioned_visibility() {
        let mut set = DeleteSet::default();
        set.add_batch(&tombstones(&[2, 2, 5], &[11, 7, 3]), "pk", Some("ver"))
            .unwrap();

        assert_eq!(set.versions(&PkValue::Int64(2)), &[11, 7]);

        // untouched key
        assert!(set.is_visible(&PkValue::Int64(1), Some(10)));
        // deleted at 11: a version-10 row is gone, a version-12 row survives
        assert!(!set.is_visible(&PkValue::Int64(2), Some(10)));
        assert!(!set.is_visible(&PkValue::Int64(2), Some(11)));
        assert!(set.is_visible(&PkValue::Int64(2), Some(12)));
        assert!(set.is_visible(&PkValue::Int64(5), Some(4)));
    }

    #[test]
    fn test_unversioned_suppression() {
        let schema = Arc::new(Schema::new(vec![Field::new("pk", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["a", "b"]))],
        )
        .unwrap();

        let mut set = DeleteSet::default();
        set.add_batch(&batch, "pk", None).unwrap();

        assert!(!set.is_visible(&PkValue::Utf8("a".to_string()), None));
        assert!(set.is_visible(&PkValue::Utf8("c".to_string()), None));
        // presence with no versions also hides versioned rows
        assert!(!set.is_visible(&PkValue::Utf8("a".to_string()), Some(99)));
    }

    #[test]
    fn test_mask_over_batch() {
        let mut set = DeleteSet::default();
        set.add_batch(&tombstones(&[2], &[11]), "pk", Some("ver")).unwrap();

        let rows = tombstones(&[1, 2, 3], &[10, 10, 10]);
        let mask = set.mask(&rows, "pk", Some("ver")).unwrap();
        let kept: Vec<bool> = (0..mask.len()).map(|i| mask.value(i)).collect();
        assert_eq!(kept, vec![true, false, true]);
    }
}
