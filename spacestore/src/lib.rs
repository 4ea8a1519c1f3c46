//! spacestore - versioned columnar Space storage
//!
//! A Space is a directory-rooted dataset that mixes scalar fields with one
//! large vector field. Incoming record batches are split into two parallel
//! column groups (scalar and vector), written as Arrow IPC files, and
//! catalogued by an immutable, versioned manifest that is published with an
//! atomic rename. Deletes are tombstone files applied at read time; opaque
//! blobs ride along in the manifest as a side channel.
//!
//! On-disk layout under a Space root:
//! ```text
//! root/manifest/<version>.mf       committed manifest
//! root/manifest/<version>.mf.tmp   in-flight manifest (transient)
//! root/scalar/<uuid>.arrow         scalar column-group files
//! root/vector/<uuid>.arrow         vector column-group files
//! root/delete/<uuid>.arrow         tombstone files
//! root/blob/<uuid>                 opaque blob payloads
//! ```

pub mod filter;
pub mod fs;
pub mod manifest;
pub mod paths;
pub mod schema;
pub mod space;

pub(crate) mod format;

// Re-export main types
pub use filter::{CompareOp, Filter, ScalarValue};
pub use manifest::{BlobEntry, Fragment, Manifest};
pub use schema::{SchemaOptions, SpaceSchema};
pub use space::{OpenOptions, ReadOptions, Space, SpaceReader, WriteOptions};

/// Storage error type
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error("schema is missing: opening a new space requires a schema")]
    SchemaMissing,

    #[error("invalid schema: {0}")]
    SchemaInvalid(String),

    #[error("schema not match")]
    SchemaMismatch,

    #[error("manifest not found for version {0}")]
    ManifestNotFound(i64),

    #[error("manifest corrupt: {0}")]
    ManifestCorrupt(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("blob already exists: {0}")]
    BlobAlreadyExists(String),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("short write: wrote {written} bytes but expected {expected}")]
    ShortWrite { written: usize, expected: usize },

    #[error("invalid space uri: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, SpaceError>;
