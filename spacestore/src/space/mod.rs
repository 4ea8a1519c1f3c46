//! Space lifecycle and write/delete/blob pipelines
//!
//! A `Space` is shared state for concurrent readers and writers inside one
//! process. The only mutable field is the current-manifest pointer: readers
//! clone the `Arc` under a read lock and work on the immutable snapshot;
//! writers serialize on the write lock for clone -> mutate -> persist ->
//! rename -> swap -> bump `next_version`. Data-file encoding happens before
//! the lock, so only manifest publication is serialized.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use log::debug;
use parking_lot::RwLock;

use crate::format::RecordWriter;
use crate::fs::{build_filesystem, FileSystem};
use crate::manifest::{store, BlobEntry, Fragment, Manifest};
use crate::paths;
use crate::schema::{SpaceSchema, OFFSET_FIELD_NAME};
use crate::{Result, SpaceError};

mod delete_set;
mod options;
mod read;

pub use delete_set::{DeleteSet, PkValue};
pub use options::{OpenOptions, ReadOptions, WriteOptions};
pub use read::SpaceReader;


#[derive(Debug)]
pub struct Space {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    schema: SpaceSchema,
    manifest: RwLock<Arc<Manifest>>,
    next_version: AtomicI64,
}

impl Space {
    /// Open a Space, creating it when no manifest exists yet.
    ///
    /// Creation requires `options.schema`; otherwise the newest manifest is
    /// loaded, or the one named by `options.version` when pinned.
    pub fn open(uri: &str, options: OpenOptions) -> Result<Space> {
        let (fs, root) = build_filesystem(uri)?;
        debug!("open space at {}", root.display());

        fs.create_dir(&paths::manifest_dir(&root))?;
        fs.create_dir(&paths::scalar_dir(&root))?;
        fs.create_dir(&paths::vector_dir(&root))?;
        fs.create_dir(&paths::delete_dir(&root))?;
        fs.create_dir(&paths::blob_dir(&root))?;

        let committed = store::list_manifests(fs.as_ref(), &root)?;

        let manifest = if committed.is_empty() {
            let Some((schema, schema_options)) = options.schema else {
                return Err(SpaceError::SchemaMissing);
            };
            let schema = SpaceSchema::try_new(schema, schema_options)?;
            let manifest = Manifest::new(schema);
            store::save_manifest(fs.as_ref(), &root, &manifest)?;
            manifest
        } else if let Some(version) = options.version {
            let entry = committed
                .iter()
                .find(|(v, _)| *v == version)
                .ok_or(SpaceError::ManifestNotFound(version))?;
            store::load_manifest(fs.as_ref(), &entry.1)?
        } else {
            let entry = committed.last().expect("non-empty");
            store::load_manifest(fs.as_ref(), &entry.1)?
        };

        let schema = manifest.schema().clone();
        let next_version = manifest.version() + 1;
        Ok(Space {
            fs,
            root,
            schema,
            manifest: RwLock::new(Arc::new(manifest)),
            next_version: AtomicI64::new(next_version),
        })
    }

    pub fn schema(&self) -> &SpaceSchema {
        &self.schema
    }

    /// Snapshot of the current manifest. Everything reachable through it
    /// is immutable.
    pub fn manifest(&self) -> Arc<Manifest> {
        self.manifest.read().clone()
    }

    pub fn current_version(&self) -> i64 {
        self.manifest.read().version()
    }

    /// Append a stream of record batches as one new scalar/vector fragment
    /// pair and publish a new manifest version.
    ///
    /// The stream schema must equal the Space's user schema. Either the new
    /// manifest is published with exactly one scalar and one vector
    /// fragment, or no manifest changes; files from a failed call stay
    /// behind as orphans and are never referenced.
    pub fn write<R: RecordBatchReader>(&self, mut reader: R, options: &WriteOptions) -> Result<()> {
        if reader.schema().as_ref() != self.schema.user_schema().as_ref() {
            return Err(SpaceError::SchemaMismatch);
        }

        let current_version = self.current_version();
        let mut scalar_fragment = Fragment::new(current_version);
        let mut vector_fragment = Fragment::new(current_version);
        let mut writers: Option<(RecordWriter, RecordWriter)> = None;
        let max_per_file = options.max_record_per_file.max(1);

        for batch in reader.by_ref() {
            let batch = batch?;
            if batch.num_rows() == 0 {
                continue;
            }

            let mut start = 0usize;
            while start < batch.num_rows() {
                if writers.is_none() {
                    // files open and close in pairs
                    let (scalar_rel, scalar_path) = paths::new_scalar_file(&self.root);
                    let (vector_rel, vector_path) = paths::new_vector_file(&self.root);
                    let scalar_writer = RecordWriter::create(
                        self.fs.as_ref(),
                        &scalar_path,
                        self.schema.scalar_schema(),
                    )?;
                    let vector_writer = RecordWriter::create(
                        self.fs.as_ref(),
                        &vector_path,
                        self.schema.vector_schema(),
                    )?;
                    scalar_fragment.add_file(scalar_rel);
                    vector_fragment.add_file(vector_rel);
                    writers = Some((scalar_writer, vector_writer));
                }
                let (scalar_writer, vector_writer) = writers.as_mut().expect("just opened");

                let capacity = max_per_file.saturating_sub(scalar_writer.row_count()) as usize;
                let take = capacity.max(1).min(batch.num_rows() - start);
                let slice = batch.slice(start, take);
                start += take;

                scalar_writer.write(&self.project_scalar(&slice)?)?;
                vector_writer.write(&self.project_vector(&slice)?)?;

                if scalar_writer.row_count() >= max_per_file {
                    let (scalar_writer, vector_writer) = writers.take().expect("open pair");
                    debug!("roll file pair at {} rows", scalar_writer.row_count());
                    scalar_writer.close()?;
                    vector_writer.close()?;
                }
            }
        }

        if let Some((scalar_writer, vector_writer)) = writers.take() {
            scalar_writer.close()?;
            vector_writer.close()?;
        }

        if scalar_fragment.is_empty() {
            // nothing emitted: succeed without publishing
            return Ok(());
        }

        self.publish(|manifest, next_version| {
            scalar_fragment.set_id(next_version);
            vector_fragment.set_id(next_version);
            manifest.add_scalar_fragment(scalar_fragment.clone());
            manifest.add_vector_fragment(vector_fragment.clone());
        })
    }

    /// Write tombstones. The stream schema must equal the delete schema;
    /// all tombstones of one call land in a single delete file.
    pub fn delete<R: RecordBatchReader>(&self, mut reader: R) -> Result<()> {
        if reader.schema().as_ref() != self.schema.delete_schema().as_ref() {
            return Err(SpaceError::SchemaMismatch);
        }

        let current_version = self.current_version();
        let mut fragment = Fragment::new(current_version);
        let mut writer: Option<RecordWriter> = None;

        for batch in reader.by_ref() {
            let batch = batch?;
            if batch.num_rows() == 0 {
                continue;
            }
            if writer.is_none() {
                let (rel, path) = paths::new_delete_file(&self.root);
                let w =
                    RecordWriter::create(self.fs.as_ref(), &path, self.schema.delete_schema())?;
                fragment.add_file(rel);
                writer = Some(w);
            }
            writer.as_mut().expect("just opened").write(&batch)?;
        }

        let Some(writer) = writer.take() else {
            return Ok(());
        };
        writer.close()?;

        self.publish(|manifest, next_version| {
            fragment.set_id(next_version);
            manifest.add_delete_fragment(fragment.clone());
        })
    }

    /// Materialize a merged record stream over the current manifest.
    pub fn read(&self, options: ReadOptions) -> Result<SpaceReader> {
        let manifest = self.manifest();
        debug!("read at version {} with {options:?}", manifest.version());
        SpaceReader::try_new(self.fs.clone(), self.root.clone(), manifest, options)
    }

    /// Store an opaque named payload and publish a new manifest version.
    pub fn write_blob(&self, content: &[u8], name: &str, replace: bool) -> Result<()> {
        if !replace && self.manifest.read().has_blob(name) {
            return Err(SpaceError::BlobAlreadyExists(name.to_string()));
        }

        let (rel, path) = paths::new_blob_file(&self.root);
        let mut out = self.fs.open_write(&path)?;
        let written = out.write(content)?;
        if written != content.len() {
            return Err(SpaceError::ShortWrite {
                written,
                expected: content.len(),
            });
        }
        out.flush()?;
        drop(out);

        let entry = BlobEntry {
            name: name.to_string(),
            size: content.len() as i64,
            file: rel,
        };
        self.publish(|manifest, _| {
            manifest.add_blob(entry.clone());
        })
    }

    /// Read a blob into `buf`, returning the byte count (at most
    /// `min(buf.len(), blob size)`).
    pub fn read_blob(&self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let entry = self
            .manifest
            .read()
            .get_blob(name)
            .cloned()
            .ok_or_else(|| SpaceError::BlobNotFound(name.to_string()))?;

        let mut input = self.fs.open_read(&self.root.join(&entry.file))?;
        let want = buf.len().min(entry.size as usize);
        let mut read = 0usize;
        while read < want {
            let n = input.read(&mut buf[read..want])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    pub fn blob_size(&self, name: &str) -> Result<i64> {
        self.manifest
            .read()
            .get_blob(name)
            .map(|b| b.size)
            .ok_or_else(|| SpaceError::BlobNotFound(name.to_string()))
    }

    /// Clone-mutate-persist-swap under the exclusive write lock.
    /// `next_version` advances only after the rename lands.
    fn publish<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Manifest, i64),
    {
        let mut guard = self.manifest.write();
        let next_version = self.next_version.load(Ordering::SeqCst);

        let mut copied = (**guard).clone();
        copied.set_version(next_version);
        mutate(&mut copied, next_version);

        store::save_manifest(self.fs.as_ref(), &self.root, &copied)?;

        *guard = Arc::new(copied);
        self.next_version.fetch_add(1, Ordering::SeqCst);
        debug!("published manifest version {next_version}");
        Ok(())
    }

    /// Project a batch slice onto the scalar schema and append the
    /// synthetic offset column (`0..rows`, batch-local).
    fn project_scalar(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let schema = self.schema.scalar_schema();
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            if field.name() == OFFSET_FIELD_NAME {
                continue;
            }
            let column = batch
                .column_by_name(field.name())
                .ok_or_else(|| SpaceError::ColumnNotFound(field.name().clone()))?;
            columns.push(column.clone());
        }
        let offsets = Int64Array::from_iter_values(0..batch.num_rows() as i64);
        columns.push(Arc::new(offsets));
        Ok(RecordBatch::try_new(schema.clone(), columns)?)
    }

    /// Project a batch slice onto the vector schema.
    fn project_vector(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let schema = self.schema.vector_schema();
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let column = batch
                .column_by_name(field.name())
                .ok_or_else(|| SpaceError::ColumnNotFound(field.name().clone()))?;
            columns.push(column.clone());
        }
        Ok(RecordBatch::try_new(schema.clone(), columns)?)
    }
}
