//! Constant read predicates
//!
//! A filter compares one column against a literal. Masks are produced with
//! the arrow comparison kernels and AND-ed together by the read pipeline
//! before `filter_record_batch`.

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Int64Array, StringArray,
};
use arrow::compute;
use arrow::compute::kernels::cmp;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::{Result, SpaceError};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A literal to compare against. The literal type must match the column's
/// physical type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Bool(bool),
}

/// A constant predicate over one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: ScalarValue,
    },
    In {
        column: String,
        values: Vec<ScalarValue>,
    },
}

impl Filter {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: ScalarValue) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    pub fn is_in(column: impl Into<String>, values: Vec<ScalarValue>) -> Self {
        Filter::In {
            column: column.into(),
            values,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Compare { column, .. } => column,
            Filter::In { column, .. } => column,
        }
    }

    /// Evaluate to a row mask over `batch`.
    pub fn mask(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        let array = batch
            .column_by_name(self.column())
            .ok_or_else(|| SpaceError::ColumnNotFound(self.column().to_string()))?;
        match self {
            Filter::Compare { op, value, .. } => compare_mask(array, *op, value),
            Filter::In { values, .. } => {
                // OR over the member equalities; empty lists match nothing
                let mut mask: Option<BooleanArray> = None;
                for value in values {
                    let m = compare_mask(array, CompareOp::Eq, value)?;
                    mask = Some(match mask {
                        Some(acc) => compute::or(&acc, &m)?,
                        None => m,
                    });
                }
                Ok(mask.unwrap_or_else(|| all_false(batch.num_rows())))
            }
        }
    }
}

fn compare_mask(array: &ArrayRef, op: CompareOp, value: &ScalarValue) -> Result<BooleanArray> {
    match value {
        ScalarValue::Int64(v) => {
            check_type(array, &DataType::Int64)?;
            let scalar = Int64Array::new_scalar(*v);
            apply_op(array, op, &scalar)
        }
        ScalarValue::Float64(v) => {
            check_type(array, &DataType::Float64)?;
            let scalar = Float64Array::new_scalar(*v);
            apply_op(array, op, &scalar)
        }
        ScalarValue::Utf8(v) => {
            check_type(array, &DataType::Utf8)?;
            let scalar = StringArray::new_scalar(v.as_str());
            apply_op(array, op, &scalar)
        }
        ScalarValue::Bool(v) => {
            check_type(array, &DataType::Boolean)?;
            let scalar = BooleanArray::new_scalar(*v);
            apply_op(array, op, &scalar)
        }
    }
}

fn apply_op(
    array: &ArrayRef,
    op: CompareOp,
    scalar: &dyn arrow::array::Datum,
) -> Result<BooleanArray> {
    let mask = match op {
        CompareOp::Eq => cmp::eq(array, scalar)?,
        CompareOp::Ne => cmp::neq(array, scalar)?,
        CompareOp::Lt => cmp::lt(array, scalar)?,
        CompareOp::Le => cmp::lt_eq(array, scalar)?,
        CompareOp::Gt => cmp::gt(array, scalar)?,
        CompareOp::Ge => cmp::gt_eq(array, scalar)?,
    };
    Ok(mask)
}

fn check_type(array: &ArrayRef, expected: &DataType) -> Result<()> {
    if array.data_type() != expected {
        return Err(SpaceError::SchemaInvalid(format!(
            "filter literal type {expected} does not match column type {}",
            array.data_type()
        )));
    }
    Ok(())
}

fn all_false(rows: usize) -> BooleanArray {
    let mut builder = BooleanBuilder::with_capacity(rows);
    for _ in 0..rows {
        builder.append_value(false);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{Field, Schema};

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("n", DataType::Int64, false),
            Field::new("s", DataType::Utf8, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
                Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
            ],
        )
        .unwrap()
    }

    fn truthy(mask: &BooleanArray) -> Vec<bool> {
        (0..mask.len()).map(|i| mask.value(i)).collect()
    }

    #[test]
    fn test_compare_ops() {
        let b = batch();
        let cases = [
            (CompareOp::Eq, vec![false, true, false, false]),
            (CompareOp::Ne, vec![true, false, true, true]),
            (CompareOp::Lt, vec![true, false, false, false]),
            (CompareOp::Le, vec![true, true, false, false]),
            (CompareOp::Gt, vec![false, false, true, true]),
            (CompareOp::Ge, vec![false, true, true, true]),
        ];
        for (op, expected) in cases {
            let mask = Filter::compare("n", op, ScalarValue::Int64(2)).mask(&b).unwrap();
            assert_eq!(truthy(&mask), expected, "{op:?}");
        }
    }

    #[test]
    fn test_string_compare() {
        let b = batch();
        let mask = Filter::compare("s", CompareOp::Eq, ScalarValue::Utf8("c".to_string()))
            .mask(&b)
            .unwrap();
        assert_eq!(truthy(&mask), vec![false, false, true, false]);
    }

    #[test]
    fn test_in_list() {
        let b = batch();
        let mask = Filter::is_in("n", vec![ScalarValue::Int64(1), ScalarValue::Int64(4)])
            .mask(&b)
            .unwrap();
        assert_eq!(truthy(&mask), vec![true, false, false, true]);

        let mask = Filter::is_in("n", vec![]).mask(&b).unwrap();
        assert_eq!(truthy(&mask), vec![false, false, false, false]);
    }

    #[test]
    fn test_unknown_column() {
        let b = batch();
        let err = Filter::compare("zz", CompareOp::Eq, ScalarValue::Int64(1))
            .mask(&b)
            .unwrap_err();
        assert!(matches!(err, SpaceError::ColumnNotFound(_)));
    }

    #[test]
    fn test_literal_type_mismatch() {
        let b = batch();
        let err = Filter::compare("n", CompareOp::Eq, ScalarValue::Utf8("1".to_string()))
            .mask(&b)
            .unwrap_err();
        assert!(matches!(err, SpaceError::SchemaInvalid(_)));
    }
}
