//! Columnar codec seam
//!
//! Data files are Arrow IPC files. The writer wrapper tracks the number of
//! rows written so the write pipeline can roll files at a threshold; the
//! reader preserves the batch boundaries that were written, which the
//! scalar/vector join relies on.

use std::io::Write;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use crate::fs::{FileSystem, FsRead, FsWrite};
use crate::Result;

/// Batch writer for one data file, with a row-count accessor for
/// roll-over decisions.
pub struct RecordWriter {
    inner: FileWriter<Box<dyn FsWrite>>,
    rows: u64,
}

impl RecordWriter {
    pub fn create(fs: &dyn FileSystem, path: &Path, schema: &SchemaRef) -> Result<Self> {
        let out = fs.open_write(path)?;
        let inner = FileWriter::try_new(out, schema)?;
        Ok(Self { inner, rows: 0 })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.inner.write(batch)?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    /// Rows written to this file so far.
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// Write the footer and flush. A file never enters a fragment without
    /// passing through here.
    pub fn close(mut self) -> Result<()> {
        self.inner.finish()?;
        let mut out = self.inner.into_inner()?;
        out.flush()?;
        Ok(())
    }
}

/// Open a data file for batch-wise reading.
pub fn open_record_reader(
    fs: &dyn FileSystem,
    path: &Path,
) -> Result<FileReader<Box<dyn FsRead>>> {
    let input = fs.open_read(path)?;
    Ok(FileReader::try_new(input, None)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use tempfile::tempdir;

    use super::*;
    use crate::fs::LocalFileSystem;

    fn batch(schema: &SchemaRef, values: &[i64]) -> RecordBatch {
        RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(values.to_vec()))],
        )
        .unwrap()
    }

    #[test]
    fn test_write_read_preserves_batch_boundaries() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem;
        let path = dir.path().join("f.arrow");
        let schema: SchemaRef = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)]));

        let mut writer = RecordWriter::create(&fs, &path, &schema).unwrap();
        writer.write(&batch(&schema, &[1, 2, 3])).unwrap();
        writer.write(&batch(&schema, &[4])).unwrap();
        assert_eq!(writer.row_count(), 4);
        writer.close().unwrap();

        let reader = open_record_reader(&fs, &path).unwrap();
        let sizes: Vec<usize> = reader.map(|b| b.unwrap().num_rows()).collect();
        assert_eq!(sizes, vec![3, 1]);
    }
}
