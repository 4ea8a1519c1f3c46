//! Open / write / read configuration

use arrow::datatypes::SchemaRef;

use crate::filter::Filter;
use crate::schema::SchemaOptions;

/// Options for [`Space::open`](crate::Space::open).
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Schema plus role assignments. Required when the Space does not
    /// exist yet; ignored when it does.
    pub schema: Option<(SchemaRef, SchemaOptions)>,
    /// Pin the Space to a specific manifest version instead of the newest.
    pub version: Option<i64>,
}

impl OpenOptions {
    pub fn with_schema(mut self, schema: SchemaRef, options: SchemaOptions) -> Self {
        self.schema = Some((schema, options));
        self
    }

    pub fn at_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Options for [`Space::write`](crate::Space::write).
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Row threshold at which the current scalar/vector file pair is
    /// closed and a fresh pair opened. Zero behaves as one.
    pub max_record_per_file: u64,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            max_record_per_file: 1024,
        }
    }
}

/// Options for [`Space::read`](crate::Space::read).
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Columns to project; `None` keeps the full user schema. When the
    /// schema has a version column it is force-included so the delete
    /// rule stays applicable.
    pub columns: Option<Vec<String>>,
    /// Constant predicates, AND-ed together.
    pub filters: Vec<Filter>,
    /// Only rows whose version-column value is at most this are returned.
    pub version: Option<i64>,
}

impl ReadOptions {
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}
