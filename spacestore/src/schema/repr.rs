//! Serializable schema representation
//!
//! The manifest file must outlive any one Arrow release, so field types are
//! stored as a closed enum instead of Arrow's own (non-serializable)
//! `DataType`. A user schema containing a type outside this set is rejected
//! at Space creation, never at manifest-write time.

use arrow::datatypes::{DataType, Field, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::{Result, SpaceError};

/// Physical column types a manifest can describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Bool,
    Utf8,
    Binary,
    /// Microseconds since epoch, no timezone.
    TimestampMicros,
    Date32,
    FixedSizeList {
        item: Box<FieldRepr>,
        len: i32,
    },
}

/// One schema field: name, closed type, nullability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRepr {
    pub name: String,
    pub data_type: ColumnType,
    pub nullable: bool,
}

impl FieldRepr {
    pub fn from_arrow(field: &Field) -> Result<Self> {
        let data_type = match field.data_type() {
            DataType::Int8 => ColumnType::Int8,
            DataType::Int16 => ColumnType::Int16,
            DataType::Int32 => ColumnType::Int32,
            DataType::Int64 => ColumnType::Int64,
            DataType::UInt8 => ColumnType::UInt8,
            DataType::UInt16 => ColumnType::UInt16,
            DataType::UInt32 => ColumnType::UInt32,
            DataType::UInt64 => ColumnType::UInt64,
            DataType::Float16 => ColumnType::Float16,
            DataType::Float32 => ColumnType::Float32,
            DataType::Float64 => ColumnType::Float64,
            DataType::Boolean => ColumnType::Bool,
            DataType::Utf8 => ColumnType::Utf8,
            DataType::Binary => ColumnType::Binary,
            DataType::Timestamp(TimeUnit::Microsecond, None) => ColumnType::TimestampMicros,
            DataType::Date32 => ColumnType::Date32,
            DataType::FixedSizeList(item, len) => ColumnType::FixedSizeList {
                item: Box::new(FieldRepr::from_arrow(item)?),
                len: *len,
            },
            other => {
                return Err(SpaceError::SchemaInvalid(format!(
                    "unsupported column type {other} for field {}",
                    field.name()
                )))
            }
        };
        Ok(Self {
            name: field.name().clone(),
            data_type,
            nullable: field.is_nullable(),
        })
    }

    pub fn to_arrow(&self) -> Field {
        let data_type = match &self.data_type {
            ColumnType::Int8 => DataType::Int8,
            ColumnType::Int16 => DataType::Int16,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt8 => DataType::UInt8,
            ColumnType::UInt16 => DataType::UInt16,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::Float16 => DataType::Float16,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Binary => DataType::Binary,
            ColumnType::TimestampMicros => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnType::Date32 => DataType::Date32,
            ColumnType::FixedSizeList { item, len } => {
                DataType::FixedSizeList(std::sync::Arc::new(item.to_arrow()), *len)
            }
        };
        Field::new(&self.name, data_type, self.nullable)
    }
}
