//! Literal conversion in both directions.

use ffq_common::{FfqError, Result};
use ffq_planner::LiteralValue;

use crate::context::{InboundContext, OutboundContext};
use crate::proto::{DecimalLiteral, Literal, LiteralType};
use crate::type_convert::UTC;

pub fn to_proto_literal(v: &LiteralValue, ctx: &mut OutboundContext<'_>) -> Result<Literal> {
    let literal_type = match v {
        LiteralValue::Boolean(b) => LiteralType::Boolean(*b),
        LiteralValue::Int8(x) => LiteralType::I8(i32::from(*x)),
        LiteralValue::Int16(x) => LiteralType::I16(i32::from(*x)),
        LiteralValue::Int32(x) => LiteralType::I32(*x),
        LiteralValue::Int64(x) => LiteralType::I64(*x),
        LiteralValue::Float32(x) => LiteralType::Fp32(*x),
        LiteralValue::Float64(x) => LiteralType::Fp64(*x),
        LiteralValue::Utf8(s) => LiteralType::String(s.clone()),
        LiteralValue::Binary(b) => LiteralType::Binary(b.clone()),
        LiteralValue::Date32(d) => LiteralType::Date(*d),
        LiteralValue::TimestampMicros {
            value,
            timezone: None,
        } => LiteralType::Timestamp(*value),
        LiteralValue::TimestampMicros {
            value,
            timezone: Some(_),
        } => LiteralType::TimestampTz(*value),
        LiteralValue::Decimal128 {
            value,
            precision,
            scale,
        } => LiteralType::Decimal(DecimalLiteral {
            value: value.to_le_bytes().to_vec(),
            precision: i32::from(*precision),
            scale: i32::from(*scale),
        }),
        LiteralValue::Null(dt) => LiteralType::Null(ctx.convert_type(dt)?),
    };
    Ok(Literal {
        nullable: v.is_null(),
        literal_type,
    })
}

fn narrow<T: TryFrom<i32>>(v: i32, what: &str) -> Result<T> {
    T::try_from(v).map_err(|_| FfqError::Structural(format!("{what} literal {v} out of range")))
}

pub fn from_proto_literal(lit: &Literal, ctx: &InboundContext<'_>) -> Result<LiteralValue> {
    let v = match &lit.literal_type {
        LiteralType::Boolean(b) => LiteralValue::Boolean(*b),
        LiteralType::I8(x) => LiteralValue::Int8(narrow(*x, "i8")?),
        LiteralType::I16(x) => LiteralValue::Int16(narrow(*x, "i16")?),
        LiteralType::I32(x) => LiteralValue::Int32(*x),
        LiteralType::I64(x) => LiteralValue::Int64(*x),
        LiteralType::Fp32(x) => LiteralValue::Float32(*x),
        LiteralType::Fp64(x) => LiteralValue::Float64(*x),
        LiteralType::String(s) => LiteralValue::Utf8(s.clone()),
        LiteralType::Binary(b) => LiteralValue::Binary(b.clone()),
        LiteralType::Date(d) => LiteralValue::Date32(*d),
        LiteralType::Timestamp(t) => LiteralValue::TimestampMicros {
            value: *t,
            timezone: None,
        },
        LiteralType::TimestampTz(t) => LiteralValue::TimestampMicros {
            value: *t,
            timezone: Some(UTC.to_string()),
        },
        LiteralType::Decimal(d) => {
            let bytes: [u8; 16] = d.value.as_slice().try_into().map_err(|_| {
                FfqError::Structural(format!(
                    "decimal literal must be 16 bytes, got {}",
                    d.value.len()
                ))
            })?;
            LiteralValue::Decimal128 {
                value: i128::from_le_bytes(bytes),
                precision: narrow(d.precision, "decimal precision")?,
                scale: narrow(d.scale, "decimal scale")?,
            }
        }
        LiteralType::Null(t) => LiteralValue::Null(ctx.convert_type(t)?),
    };
    Ok(v)
}
