//! Native (Arrow) ↔ interchange type mapping.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, IntervalUnit, TimeUnit};
use ffq_common::{FfqError, Result};

use crate::catalog::Catalog;
use crate::collector::ExtensionCollector;
use crate::proto::Type;
use crate::types::{SimpleType, TypeExpr, TypeParam, UNKNOWN_TYPE};

/// Zone attached to timestamps that arrive as zoned interchange timestamps.
pub const UTC: &str = "UTC";

/// Converts a native type, registering the `unknown` type extension for nulls.
pub fn to_proto_type(
    dt: &DataType,
    catalog: &Catalog,
    collector: &mut ExtensionCollector,
) -> Result<Type> {
    let t = match dt {
        DataType::Boolean => Type::Bool,
        DataType::Int8 => Type::I8,
        DataType::Int16 => Type::I16,
        DataType::Int32 => Type::I32,
        DataType::Int64 => Type::I64,
        DataType::Float32 => Type::Fp32,
        DataType::Float64 => Type::Fp64,
        DataType::Utf8 | DataType::LargeUtf8 => Type::String,
        DataType::Binary | DataType::LargeBinary => Type::Binary,
        DataType::FixedSizeBinary(n) => Type::FixedBinary { length: *n },
        DataType::Date32 => Type::Date,
        DataType::Time64(TimeUnit::Microsecond) => Type::Time,
        DataType::Timestamp(TimeUnit::Microsecond, None) => Type::Timestamp,
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => Type::TimestampTz,
        DataType::Interval(IntervalUnit::YearMonth) => Type::IntervalYear,
        DataType::Interval(IntervalUnit::DayTime) => Type::IntervalDay,
        DataType::Decimal128(p, s) => Type::Decimal {
            precision: i32::from(*p),
            scale: i32::from(*s),
        },
        DataType::List(f) | DataType::LargeList(f) => Type::List {
            r#type: Box::new(to_proto_type(f.data_type(), catalog, collector)?),
        },
        DataType::Map(entries, _) => {
            let (key, value) = map_entry_types(entries.data_type())?;
            Type::Map {
                key: Box::new(to_proto_type(key, catalog, collector)?),
                value: Box::new(to_proto_type(value, catalog, collector)?),
            }
        }
        DataType::Struct(fields) => Type::Struct {
            types: fields
                .iter()
                .map(|f| to_proto_type(f.data_type(), catalog, collector))
                .collect::<Result<Vec<_>>>()?,
        },
        DataType::Null => {
            let anchor = catalog.find_type(UNKNOWN_TYPE).ok_or_else(|| {
                FfqError::FunctionLookup(
                    "catalog declares no 'unknown' type for null values".to_string(),
                )
            })?;
            Type::UserDefined {
                type_reference: collector.type_reference(anchor),
            }
        }
        other => {
            return Err(FfqError::Unsupported(format!(
                "native type {other} has no interchange equivalent"
            )))
        }
    };
    Ok(t)
}

/// Converts an interchange type; `user_types` maps type anchors to declared names.
pub fn from_proto_type(t: &Type, user_types: &HashMap<u32, String>) -> Result<DataType> {
    let dt = match t {
        Type::Bool => DataType::Boolean,
        Type::I8 => DataType::Int8,
        Type::I16 => DataType::Int16,
        Type::I32 => DataType::Int32,
        Type::I64 => DataType::Int64,
        Type::Fp32 => DataType::Float32,
        Type::Fp64 => DataType::Float64,
        Type::VarChar { length } | Type::FixedChar { length } | Type::FixedBinary { length }
            if *length < 0 =>
        {
            return Err(FfqError::Structural(format!("negative type length {length}")))
        }
        Type::String | Type::VarChar { .. } | Type::FixedChar { .. } => DataType::Utf8,
        Type::Binary => DataType::Binary,
        Type::FixedBinary { length } => DataType::FixedSizeBinary(*length),
        Type::Uuid => DataType::FixedSizeBinary(16),
        Type::Date => DataType::Date32,
        Type::Time => DataType::Time64(TimeUnit::Microsecond),
        Type::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        Type::TimestampTz => DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from(UTC))),
        Type::IntervalYear => DataType::Interval(IntervalUnit::YearMonth),
        Type::IntervalDay => DataType::Interval(IntervalUnit::DayTime),
        Type::Decimal { precision, scale } => {
            let p = u8::try_from(*precision).map_err(|_| {
                FfqError::Structural(format!("decimal precision {precision} out of range"))
            })?;
            let s = i8::try_from(*scale).map_err(|_| {
                FfqError::Structural(format!("decimal scale {scale} out of range"))
            })?;
            DataType::Decimal128(p, s)
        }
        Type::List { r#type } => DataType::List(Arc::new(Field::new(
            "item",
            from_proto_type(r#type, user_types)?,
            true,
        ))),
        Type::Map { key, value } => {
            let entries = Fields::from(vec![
                Field::new("key", from_proto_type(key, user_types)?, false),
                Field::new("value", from_proto_type(value, user_types)?, true),
            ]);
            DataType::Map(
                Arc::new(Field::new("entries", DataType::Struct(entries), false)),
                false,
            )
        }
        Type::Struct { types } => DataType::Struct(
            types
                .iter()
                .enumerate()
                .map(|(i, t)| Ok(Field::new(format!("f{i}"), from_proto_type(t, user_types)?, true)))
                .collect::<Result<Vec<_>>>()?
                .into(),
        ),
        Type::UserDefined { type_reference } => match user_types.get(type_reference) {
            Some(name) if name.eq_ignore_ascii_case(UNKNOWN_TYPE) => DataType::Null,
            Some(name) => {
                return Err(FfqError::Unsupported(format!(
                    "user-defined type '{name}'"
                )))
            }
            None => {
                return Err(FfqError::Structural(format!(
                    "type anchor {type_reference} is not declared"
                )))
            }
        },
    };
    Ok(dt)
}

/// Catalog type expression of a native type, used to build lookup signatures.
pub fn to_type_expr(dt: &DataType) -> Result<TypeExpr> {
    let simple = |s: SimpleType| -> Result<TypeExpr> { Ok(TypeExpr::Simple(s)) };
    match dt {
        DataType::Boolean => simple(SimpleType::Bool),
        DataType::Int8 => simple(SimpleType::I8),
        DataType::Int16 => simple(SimpleType::I16),
        DataType::Int32 => simple(SimpleType::I32),
        DataType::Int64 => simple(SimpleType::I64),
        DataType::Float32 => simple(SimpleType::Fp32),
        DataType::Float64 => simple(SimpleType::Fp64),
        DataType::Utf8 | DataType::LargeUtf8 => simple(SimpleType::String),
        DataType::Binary | DataType::LargeBinary => simple(SimpleType::Binary),
        DataType::Date32 => simple(SimpleType::Date),
        DataType::Time64(TimeUnit::Microsecond) => simple(SimpleType::Time),
        DataType::Timestamp(TimeUnit::Microsecond, None) => simple(SimpleType::Timestamp),
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => simple(SimpleType::TimestampTz),
        DataType::Interval(IntervalUnit::YearMonth) => simple(SimpleType::IntervalYear),
        DataType::Interval(IntervalUnit::DayTime) => simple(SimpleType::IntervalDay),
        DataType::FixedSizeBinary(n) => Ok(TypeExpr::FixedBinary(TypeParam::Value(i64::from(*n)))),
        DataType::Decimal128(p, s) => Ok(TypeExpr::Decimal {
            precision: TypeParam::Value(i64::from(*p)),
            scale: TypeParam::Value(i64::from(*s)),
        }),
        DataType::List(f) | DataType::LargeList(f) => {
            Ok(TypeExpr::List(Box::new(to_type_expr(f.data_type())?)))
        }
        DataType::Map(entries, _) => {
            let (key, value) = map_entry_types(entries.data_type())?;
            Ok(TypeExpr::Map {
                key: Box::new(to_type_expr(key)?),
                value: Box::new(to_type_expr(value)?),
            })
        }
        DataType::Struct(fields) => Ok(TypeExpr::Struct(
            fields
                .iter()
                .map(|f| to_type_expr(f.data_type()))
                .collect::<Result<Vec<_>>>()?,
        )),
        DataType::Null => Ok(TypeExpr::UserDefined(UNKNOWN_TYPE.to_string())),
        other => Err(FfqError::Unsupported(format!(
            "native type {other} has no catalog equivalent"
        ))),
    }
}

fn map_entry_types(entries: &DataType) -> Result<(&DataType, &DataType)> {
    match entries {
        DataType::Struct(fields) if fields.len() == 2 => {
            Ok((fields[0].data_type(), fields[1].data_type()))
        }
        other => Err(FfqError::Structural(format!(
            "map entries must be a two-field struct, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::load(&[CatalogSource::new(
            "/unknown.yaml",
            json!({"types": [{"name": "unknown"}]}),
        )])
        .expect("catalog")
    }

    #[test]
    fn nested_types_survive_both_directions() {
        let dt = DataType::List(Arc::new(Field::new(
            "item",
            DataType::Decimal128(12, 3),
            true,
        )));
        let mut c = ExtensionCollector::new();
        let t = to_proto_type(&dt, &catalog(), &mut c).expect("outbound");
        assert_eq!(
            t,
            Type::List {
                r#type: Box::new(Type::Decimal {
                    precision: 12,
                    scale: 3
                })
            }
        );
        assert_eq!(from_proto_type(&t, &HashMap::new()).expect("inbound"), dt);
        assert_eq!(to_type_expr(&dt).expect("expr").signature(), "list<dec<12,3>>");
    }

    #[test]
    fn null_maps_to_unknown_extension() {
        let mut c = ExtensionCollector::new();
        let t = to_proto_type(&DataType::Null, &catalog(), &mut c).expect("null");
        assert_eq!(t, Type::UserDefined { type_reference: 1 });
        assert_eq!(c.type_count(), 1);

        let declared = HashMap::from([(1, "UNKNOWN".to_string()), (2, "geo".to_string())]);
        assert_eq!(from_proto_type(&t, &declared).expect("inbound"), DataType::Null);
        let geo = Type::UserDefined { type_reference: 2 };
        assert!(matches!(
            from_proto_type(&geo, &declared),
            Err(FfqError::Unsupported(_))
        ));
    }

    #[test]
    fn negative_lengths_are_rejected() {
        let none = HashMap::new();
        for t in [
            Type::FixedBinary { length: -1 },
            Type::FixedChar { length: -4 },
            Type::VarChar { length: -8 },
        ] {
            assert!(matches!(
                from_proto_type(&t, &none),
                Err(FfqError::Structural(_))
            ));
        }
        assert_eq!(
            from_proto_type(&Type::FixedBinary { length: 0 }, &none).expect("zero"),
            DataType::FixedSizeBinary(0)
        );
    }

    #[test]
    fn null_without_catalog_type_fails() {
        let mut c = ExtensionCollector::new();
        let empty = Catalog::default();
        assert!(to_proto_type(&DataType::Null, &empty, &mut c).is_err());
    }
}
