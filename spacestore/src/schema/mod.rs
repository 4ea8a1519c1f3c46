//! Schema view: user schema plus column roles
//!
//! The caller hands over an Arrow schema and names three roles in it: a
//! primary column, an optional version column, and the one heavy vector
//! column. From those, three derived schemas are computed once and frozen
//! for the Space's lifetime:
//!
//! - scalar schema: every field except the vector, plus a synthetic
//!   `_offset: int64` appended last
//! - vector schema: primary, version (if declared), vector
//! - delete schema: primary, version (if declared)

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::{Result, SpaceError};

mod repr;

pub use repr::{ColumnType, FieldRepr};

/// Name of the synthetic scalar-file offset column. Joins scalar rows to
/// the vector rows emitted by the same write call.
pub const OFFSET_FIELD_NAME: &str = "_offset";

/// Column role assignments for a Space schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOptions {
    pub primary_column: String,
    #[serde(default)]
    pub version_column: Option<String>,
    pub vector_column: String,
}

impl SchemaOptions {
    pub fn new(primary: impl Into<String>, vector: impl Into<String>) -> Self {
        Self {
            primary_column: primary.into(),
            version_column: None,
            vector_column: vector.into(),
        }
    }

    pub fn with_version_column(mut self, version: impl Into<String>) -> Self {
        self.version_column = Some(version.into());
        self
    }

    pub fn has_version_column(&self) -> bool {
        self.version_column.is_some()
    }
}

/// A user schema with its roles and the three derived schemas.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceSchema {
    user: SchemaRef,
    options: SchemaOptions,
    scalar: SchemaRef,
    vector: SchemaRef,
    delete: SchemaRef,
}

impl SpaceSchema {
    pub fn try_new(user: SchemaRef, options: SchemaOptions) -> Result<Self> {
        let primary = field_by_name(&user, &options.primary_column)
            .ok_or_else(|| invalid(format!("primary column {} not found", options.primary_column)))?;
        match primary.data_type() {
            DataType::Int64 | DataType::Utf8 => {}
            other => {
                return Err(invalid(format!(
                    "primary column {} must be int64 or utf8, got {other}",
                    options.primary_column
                )))
            }
        }

        let version = match &options.version_column {
            Some(name) => {
                let field = field_by_name(&user, name)
                    .ok_or_else(|| invalid(format!("version column {name} not found")))?;
                if field.data_type() != &DataType::Int64 {
                    return Err(invalid(format!(
                        "version column {name} must be int64, got {}",
                        field.data_type()
                    )));
                }
                Some(field)
            }
            None => None,
        };

        let vector = field_by_name(&user, &options.vector_column)
            .ok_or_else(|| invalid(format!("vector column {} not found", options.vector_column)))?;

        if field_by_name(&user, OFFSET_FIELD_NAME).is_some() {
            return Err(invalid(format!(
                "field {OFFSET_FIELD_NAME} collides with the synthetic offset column"
            )));
        }

        // unrepresentable field types are rejected here, not at
        // manifest-write time
        for field in user.fields() {
            repr::FieldRepr::from_arrow(field)?;
        }

        let mut scalar_fields: Vec<Field> = user
            .fields()
            .iter()
            .filter(|f| f.name() != &options.vector_column)
            .map(|f| f.as_ref().clone())
            .collect();
        scalar_fields.push(Field::new(OFFSET_FIELD_NAME, DataType::Int64, false));

        let mut vector_fields: Vec<Field> = vec![primary.as_ref().clone()];
        if let Some(v) = &version {
            vector_fields.push(v.as_ref().clone());
        }
        vector_fields.push(vector.as_ref().clone());

        let mut delete_fields: Vec<Field> = vec![primary.as_ref().clone()];
        if let Some(v) = &version {
            delete_fields.push(v.as_ref().clone());
        }

        Ok(Self {
            user,
            options,
            scalar: Arc::new(Schema::new(scalar_fields)),
            vector: Arc::new(Schema::new(vector_fields)),
            delete: Arc::new(Schema::new(delete_fields)),
        })
    }

    pub fn user_schema(&self) -> &SchemaRef {
        &self.user
    }

    pub fn scalar_schema(&self) -> &SchemaRef {
        &self.scalar
    }

    pub fn vector_schema(&self) -> &SchemaRef {
        &self.vector
    }

    pub fn delete_schema(&self) -> &SchemaRef {
        &self.delete
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn has_version_column(&self) -> bool {
        self.options.has_version_column()
    }

    pub fn primary_column(&self) -> &str {
        &self.options.primary_column
    }

    pub fn version_column(&self) -> Option<&str> {
        self.options.version_column.as_deref()
    }

    pub fn vector_column(&self) -> &str {
        &self.options.vector_column
    }

    /// Serializable form: user fields plus role options. The derived
    /// schemas are recomputed on load, so they never drift from the user
    /// schema they came from.
    pub fn to_repr(&self) -> Result<SchemaRepr> {
        let fields = self
            .user
            .fields()
            .iter()
            .map(|f| FieldRepr::from_arrow(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(SchemaRepr {
            fields,
            options: self.options.clone(),
        })
    }

    pub fn from_repr(repr: SchemaRepr) -> Result<Self> {
        let fields: Vec<Field> = repr.fields.iter().map(FieldRepr::to_arrow).collect();
        Self::try_new(Arc::new(Schema::new(fields)), repr.options)
    }
}

/// The schema block of a serialized manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRepr {
    pub fields: Vec<FieldRepr>,
    pub options: SchemaOptions,
}

fn field_by_name(schema: &SchemaRef, name: &str) -> Option<Arc<Field>> {
    schema.field_with_name(name).ok().map(|f| Arc::new(f.clone()))
}

fn invalid(msg: String) -> SpaceError {
    SpaceError::SchemaInvalid(msg)
}
