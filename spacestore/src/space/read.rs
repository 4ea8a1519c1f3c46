//! Read pipeline
//!
//! A [`SpaceReader`] walks the fragment pairs of one manifest snapshot in
//! order. Scalar and vector files of a pair were written batch-for-batch
//! by the same write call, so the N-th batch of the scalar file joins the
//! N-th batch of its vector twin; within a batch the scalar `_offset`
//! column gives the vector row for each scalar row. After the join the
//! delete set, the version pin, and the user filters are applied, then the
//! projection is taken.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use arrow::compute;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::record_batch::{RecordBatch, RecordBatchReader};

use super::delete_set::DeleteSet;
use super::options::ReadOptions;
use crate::filter::{CompareOp, Filter, ScalarValue};
use crate::format;
use crate::fs::{FileSystem, FsRead};
use crate::manifest::Manifest;
use crate::schema::OFFSET_FIELD_NAME;
use crate::{Result, SpaceError};

type PairReaders = (FileReader<Box<dyn FsRead>>, FileReader<Box<dyn FsRead>>);

/// Merged record stream over one manifest snapshot.
#[derive(Debug)]
pub struct SpaceReader {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    user_schema: SchemaRef,
    projected_schema: SchemaRef,
    projection: Option<Vec<usize>>,
    filters: Vec<Filter>,
    pk_column: String,
    version_column: Option<String>,
    vector_column: String,
    delete_set: DeleteSet,
    pairs: VecDeque<(String, String)>,
    current: Option<PairReaders>,
}

impl SpaceReader {
    pub(super) fn try_new(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        manifest: Arc<Manifest>,
        options: ReadOptions,
    ) -> Result<Self> {
        let schema = manifest.schema();
        let user_schema = schema.user_schema().clone();

        let mut filters = options.filters;
        for filter in &filters {
            if user_schema.index_of(filter.column()).is_err() {
                return Err(SpaceError::ColumnNotFound(filter.column().to_string()));
            }
        }
        if let Some(version_column) = schema.version_column() {
            let pin = options.version.unwrap_or(i64::MAX);
            filters.push(Filter::compare(version_column, CompareOp::Le, ScalarValue::Int64(pin)));
        }

        let projection = match options.columns {
            Some(columns) => {
                let mut indices = Vec::with_capacity(columns.len() + 1);
                for name in &columns {
                    let index = user_schema
                        .index_of(name)
                        .map_err(|_| SpaceError::ColumnNotFound(name.clone()))?;
                    indices.push(index);
                }
                if let Some(version_column) = schema.version_column() {
                    if !columns.iter().any(|c| c == version_column) {
                        indices.push(user_schema.index_of(version_column).expect("validated role"));
                    }
                }
                Some(indices)
            }
            None => None,
        };
        let projected_schema = match &projection {
            Some(indices) => Arc::new(user_schema.project(indices)?),
            None => user_schema.clone(),
        };

        let delete_set = DeleteSet::build(fs.as_ref(), &root, &manifest)?;

        let mut pairs = VecDeque::new();
        for scalar in manifest.scalar_fragments() {
            let vector = manifest.vector_fragment_by_id(scalar.id()).ok_or_else(|| {
                SpaceError::ManifestCorrupt(format!(
                    "scalar fragment {} has no vector counterpart",
                    scalar.id()
                ))
            })?;
            if scalar.files().len() != vector.files().len() {
                return Err(SpaceError::ManifestCorrupt(format!(
                    "fragment {} file lists are not aligned",
                    scalar.id()
                )));
            }
            for (s, v) in scalar.files().iter().zip(vector.files()) {
                pairs.push_back((s.clone(), v.clone()));
            }
        }

        Ok(Self {
            fs,
            root,
            user_schema,
            projected_schema,
            projection,
            filters,
            pk_column: schema.primary_column().to_string(),
            version_column: schema.version_column().map(str::to_string),
            vector_column: schema.vector_column().to_string(),
            delete_set,
            pairs,
            current: None,
        })
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if self.current.is_none() {
                let Some((scalar_file, vector_file)) = self.pairs.pop_front() else {
                    return Ok(None);
                };
                let scalar = format::open_record_reader(self.fs.as_ref(), &self.root.join(&scalar_file))?;
                let vector = format::open_record_reader(self.fs.as_ref(), &self.root.join(&vector_file))?;
                self.current = Some((scalar, vector));
            }

            let (scalar_reader, vector_reader) = self.current.as_mut().expect("just set");
            let Some(scalar_batch) = scalar_reader.next() else {
                self.current = None;
                continue;
            };
            let scalar_batch = scalar_batch?;
            let vector_batch = vector_reader.next().transpose()?.ok_or_else(|| {
                SpaceError::ManifestCorrupt(
                    "vector file holds fewer batches than its scalar twin".to_string(),
                )
            })?;

            let merged = self.merge(&scalar_batch, &vector_batch)?;
            let surviving = self.apply(merged)?;
            if surviving.num_rows() == 0 {
                continue;
            }
            let out = match &self.projection {
                Some(indices) => surviving.project(indices)?,
                None => surviving,
            };
            return Ok(Some(out));
        }
    }

    /// Join one scalar batch with its vector twin into a user-schema batch.
    fn merge(&self, scalar: &RecordBatch, vector: &RecordBatch) -> Result<RecordBatch> {
        if scalar.num_rows() != vector.num_rows() {
            return Err(SpaceError::ManifestCorrupt(
                "scalar/vector batch row counts differ".to_string(),
            ));
        }
        let offsets = scalar
            .column_by_name(OFFSET_FIELD_NAME)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .ok_or_else(|| {
                SpaceError::ManifestCorrupt("scalar file is missing the offset column".to_string())
            })?;
        let vector_values = vector.column_by_name(&self.vector_column).ok_or_else(|| {
            SpaceError::ManifestCorrupt("vector file is missing the vector column".to_string())
        })?;
        let aligned = compute::take(vector_values.as_ref(), offsets, None)?;

        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.user_schema.fields().len());
        for field in self.user_schema.fields() {
            if field.name() == &self.vector_column {
                columns.push(aligned.clone());
            } else {
                let column = scalar.column_by_name(field.name()).ok_or_else(|| {
                    SpaceError::ManifestCorrupt(format!(
                        "scalar file is missing column {}",
                        field.name()
                    ))
                })?;
                columns.push(column.clone());
            }
        }
        Ok(RecordBatch::try_new(self.user_schema.clone(), columns)?)
    }

    /// Delete-set rule, then the constant predicates.
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let mut batch = batch;
        if !self.delete_set.is_empty() {
            let mask = self
                .delete_set
                .mask(&batch, &self.pk_column, self.version_column.as_deref())?;
            batch = compute::filter_record_batch(&batch, &mask)?;
        }
        for filter in &self.filters {
            if batch.num_rows() == 0 {
                break;
            }
            let mask = filter.mask(&batch)?;
            batch = compute::filter_record_batch(&batch, &mask)?;
        }
        Ok(batch)
    }
}

impl Iterator for SpaceReader {
    type Item = std::result::Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(SpaceError::Arrow(e)) => Some(Err(e)),
            Err(e) => Some(Err(ArrowError::ExternalError(Box::new(e)))),
        }
    }
}

impl RecordBatchReader for SpaceReader {
    fn schema(&self) -> SchemaRef {
        self.projected_schema.clone()
    }
}
