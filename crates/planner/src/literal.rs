//! Typed scalar literals and their Arrow column encoding.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BinaryBuilder, BooleanArray, BooleanBuilder, Date32Array,
    Date32Builder, Decimal128Array, Decimal128Builder, Float32Array, Float32Builder, Float64Array,
    Float64Builder, Int16Array, Int16Builder, Int32Array, Int32Builder, Int64Array, Int64Builder,
    Int8Array, Int8Builder, NullArray, StringArray, StringBuilder, TimestampMicrosecondArray,
    TimestampMicrosecondBuilder,
};
use arrow_schema::{DataType, TimeUnit};
use ffq_common::{FfqError, Result};
use serde::{Deserialize, Serialize};

/// One typed scalar value.
///
/// Every variant knows its own [`DataType`]; nulls carry the type they stand in for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    /// Days since the unix epoch.
    Date32(i32),
    /// Microseconds since the unix epoch, optionally zoned.
    TimestampMicros {
        value: i64,
        timezone: Option<String>,
    },
    Decimal128 {
        value: i128,
        precision: u8,
        scale: i8,
    },
    Null(DataType),
}

impl LiteralValue {
    /// Native type of this literal.
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Boolean(_) => DataType::Boolean,
            LiteralValue::Int8(_) => DataType::Int8,
            LiteralValue::Int16(_) => DataType::Int16,
            LiteralValue::Int32(_) => DataType::Int32,
            LiteralValue::Int64(_) => DataType::Int64,
            LiteralValue::Float32(_) => DataType::Float32,
            LiteralValue::Float64(_) => DataType::Float64,
            LiteralValue::Utf8(_) => DataType::Utf8,
            LiteralValue::Binary(_) => DataType::Binary,
            LiteralValue::Date32(_) => DataType::Date32,
            LiteralValue::TimestampMicros { timezone, .. } => DataType::Timestamp(
                TimeUnit::Microsecond,
                timezone.as_deref().map(Arc::from),
            ),
            LiteralValue::Decimal128 {
                precision, scale, ..
            } => DataType::Decimal128(*precision, *scale),
            LiteralValue::Null(dt) => dt.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LiteralValue::Null(_))
    }

    /// Numeric view used by range predicates; `None` for non-numeric literals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LiteralValue::Int8(v) => Some(f64::from(*v)),
            LiteralValue::Int16(v) => Some(f64::from(*v)),
            LiteralValue::Int32(v) => Some(f64::from(*v)),
            LiteralValue::Int64(v) => Some(*v as f64),
            LiteralValue::Float32(v) => Some(f64::from(*v)),
            LiteralValue::Float64(v) => Some(*v),
            LiteralValue::Decimal128 { value, scale, .. } => {
                Some(*value as f64 / 10f64.powi(i32::from(*scale)))
            }
            _ => None,
        }
    }
}

fn mismatch(dt: &DataType, v: &LiteralValue) -> FfqError {
    FfqError::Structural(format!(
        "literal {v:?} does not match column type {dt}"
    ))
}

/// Builds one Arrow column of type `dt` from `values`.
///
/// Each value must be of type `dt` or a null.
pub fn literals_to_array(dt: &DataType, values: &[LiteralValue]) -> Result<ArrayRef> {
    macro_rules! build {
        ($builder:ty, $variant:ident) => {{
            let mut b = <$builder>::with_capacity(values.len());
            for v in values {
                match v {
                    LiteralValue::$variant(x) => b.append_value(*x),
                    LiteralValue::Null(_) => b.append_null(),
                    other => return Err(mismatch(dt, other)),
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }};
    }

    match dt {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),
        DataType::Boolean => build!(BooleanBuilder, Boolean),
        DataType::Int8 => build!(Int8Builder, Int8),
        DataType::Int16 => build!(Int16Builder, Int16),
        DataType::Int32 => build!(Int32Builder, Int32),
        DataType::Int64 => build!(Int64Builder, Int64),
        DataType::Float32 => build!(Float32Builder, Float32),
        DataType::Float64 => build!(Float64Builder, Float64),
        DataType::Date32 => build!(Date32Builder, Date32),
        DataType::Utf8 => {
            let mut b = StringBuilder::with_capacity(values.len(), values.len() * 8);
            for v in values {
                match v {
                    LiteralValue::Utf8(s) => b.append_value(s),
                    LiteralValue::Null(_) => b.append_null(),
                    other => return Err(mismatch(dt, other)),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        DataType::Binary => {
            let mut b = BinaryBuilder::with_capacity(values.len(), values.len() * 8);
            for v in values {
                match v {
                    LiteralValue::Binary(bytes) => b.append_value(bytes),
                    LiteralValue::Null(_) => b.append_null(),
                    other => return Err(mismatch(dt, other)),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        DataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(values.len())
                .with_timezone_opt(tz.clone());
            for v in values {
                match v {
                    LiteralValue::TimestampMicros { value, .. } => b.append_value(*value),
                    LiteralValue::Null(_) => b.append_null(),
                    other => return Err(mismatch(dt, other)),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        DataType::Decimal128(precision, scale) => {
            let mut b = Decimal128Builder::with_capacity(values.len())
                .with_precision_and_scale(*precision, *scale)
                .map_err(|e| FfqError::Structural(e.to_string()))?;
            for v in values {
                match v {
                    LiteralValue::Decimal128 { value, .. } => b.append_value(*value),
                    LiteralValue::Null(_) => b.append_null(),
                    other => return Err(mismatch(dt, other)),
                }
            }
            Ok(Arc::new(b.finish()))
        }
        other => Err(FfqError::Unsupported(format!(
            "literal column of type {other}"
        ))),
    }
}

macro_rules! downcast {
    ($array:expr, $ty:ty) => {
        $array
            .as_any()
            .downcast_ref::<$ty>()
            .ok_or_else(|| FfqError::Structural("array type does not match its data type".to_string()))?
    };
}

/// Reads row `row` of `array` back into a literal.
pub fn literal_at(array: &dyn Array, row: usize) -> Result<LiteralValue> {
    if row >= array.len() {
        return Err(FfqError::Structural(format!(
            "row {row} out of bounds for array of length {}",
            array.len()
        )));
    }
    let dt = array.data_type();
    if array.is_null(row) {
        return Ok(LiteralValue::Null(dt.clone()));
    }
    let v = match dt {
        DataType::Null => LiteralValue::Null(DataType::Null),
        DataType::Boolean => LiteralValue::Boolean(downcast!(array, BooleanArray).value(row)),
        DataType::Int8 => LiteralValue::Int8(downcast!(array, Int8Array).value(row)),
        DataType::Int16 => LiteralValue::Int16(downcast!(array, Int16Array).value(row)),
        DataType::Int32 => LiteralValue::Int32(downcast!(array, Int32Array).value(row)),
        DataType::Int64 => LiteralValue::Int64(downcast!(array, Int64Array).value(row)),
        DataType::Float32 => LiteralValue::Float32(downcast!(array, Float32Array).value(row)),
        DataType::Float64 => LiteralValue::Float64(downcast!(array, Float64Array).value(row)),
        DataType::Utf8 => {
            LiteralValue::Utf8(downcast!(array, StringArray).value(row).to_string())
        }
        DataType::Binary => {
            LiteralValue::Binary(downcast!(array, BinaryArray).value(row).to_vec())
        }
        DataType::Date32 => LiteralValue::Date32(downcast!(array, Date32Array).value(row)),
        DataType::Timestamp(TimeUnit::Microsecond, tz) => LiteralValue::TimestampMicros {
            value: downcast!(array, TimestampMicrosecondArray).value(row),
            timezone: tz.as_deref().map(str::to_string),
        },
        DataType::Decimal128(precision, scale) => LiteralValue::Decimal128 {
            value: downcast!(array, Decimal128Array).value(row),
            precision: *precision,
            scale: *scale,
        },
        other => {
            return Err(FfqError::Unsupported(format!(
                "literal column of type {other}"
            )))
        }
    };
    Ok(v)
}
