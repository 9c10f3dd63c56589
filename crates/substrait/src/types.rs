//! Type expressions as written in extension catalogs.
//!
//! A [`TypeExpr`] is either concrete (every parameter known) or a pattern that
//! mentions type variables (`any1`, `T`) or symbolic parameters (`P1`, `S1`).
//! Patterns are matched against concrete types with [`Bindings`], which
//! records one value per symbol for the duration of a single match.

use std::collections::HashMap;
use std::fmt;

use ffq_common::{FfqError, Result};

/// Parameterless interchange types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Fp32,
    Fp64,
    String,
    Binary,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    IntervalYear,
    IntervalDay,
    Uuid,
}

impl SimpleType {
    /// Token used inside signature keys.
    pub fn token(self) -> &'static str {
        match self {
            SimpleType::Bool => "bool",
            SimpleType::I8 => "i8",
            SimpleType::I16 => "i16",
            SimpleType::I32 => "i32",
            SimpleType::I64 => "i64",
            SimpleType::Fp32 => "fp32",
            SimpleType::Fp64 => "fp64",
            SimpleType::String => "str",
            SimpleType::Binary => "vbin",
            SimpleType::Timestamp => "ts",
            SimpleType::TimestampTz => "tstz",
            SimpleType::Date => "date",
            SimpleType::Time => "time",
            SimpleType::IntervalYear => "iyear",
            SimpleType::IntervalDay => "iday",
            SimpleType::Uuid => "uuid",
        }
    }

    fn from_catalog_name(lower: &str) -> Option<Self> {
        let t = match lower {
            "boolean" => SimpleType::Bool,
            "i8" => SimpleType::I8,
            "i16" => SimpleType::I16,
            "i32" => SimpleType::I32,
            "i64" => SimpleType::I64,
            "fp32" => SimpleType::Fp32,
            "fp64" => SimpleType::Fp64,
            "string" => SimpleType::String,
            "binary" => SimpleType::Binary,
            "timestamp" => SimpleType::Timestamp,
            "timestamp_tz" => SimpleType::TimestampTz,
            "date" => SimpleType::Date,
            "time" => SimpleType::Time,
            "interval_year" => SimpleType::IntervalYear,
            "interval_day" => SimpleType::IntervalDay,
            "uuid" => SimpleType::Uuid,
            _ => return None,
        };
        Some(t)
    }
}

/// Integer parameter of a parameterized type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeParam {
    Value(i64),
    Variable(String),
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeParam::Value(v) => write!(f, "{v}"),
            TypeParam::Variable(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Simple(SimpleType),
    FixedChar(TypeParam),
    VarChar(TypeParam),
    FixedBinary(TypeParam),
    Decimal {
        precision: TypeParam,
        scale: TypeParam,
    },
    List(Box<TypeExpr>),
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Struct(Vec<TypeExpr>),
    /// User-defined type, stored lowercase (e.g. `unknown`).
    UserDefined(String),
    /// Type variable such as `any1` or `T`.
    Variable(String),
}

/// Canonical name of the placeholder type used for untyped nulls.
pub const UNKNOWN_TYPE: &str = "unknown";

impl TypeExpr {
    /// Decodes a catalog type string.
    ///
    /// Matching is case-insensitive; a trailing `?` nullability marker is
    /// ignored. Names that are neither known types nor type variables fail.
    pub fn decode(raw: &str) -> Result<TypeExpr> {
        let raw = raw.trim();
        let raw = raw.strip_suffix('?').unwrap_or(raw).trim();
        let lower = raw.to_ascii_lowercase();

        let Some(open) = raw.find('<') else {
            if let Some(simple) = SimpleType::from_catalog_name(&lower) {
                return Ok(TypeExpr::Simple(simple));
            }
            if lower.starts_with(UNKNOWN_TYPE) {
                return Ok(TypeExpr::UserDefined(lower));
            }
            if let Some(name) = lower.strip_prefix("u!") {
                return Ok(TypeExpr::UserDefined(name.to_string()));
            }
            if is_type_variable(raw) {
                return Ok(TypeExpr::Variable(lower));
            }
            return Err(FfqError::CatalogLoad(format!("unknown type '{raw}'")));
        };

        let close = raw
            .rfind('>')
            .filter(|&c| c > open)
            .ok_or_else(|| FfqError::CatalogLoad(format!("unbalanced type '{raw}'")))?;
        let base = lower[..open].trim();
        let params = split_top_level(&raw[open + 1..close]);

        let arity = |n: usize| -> Result<()> {
            if params.len() != n {
                return Err(FfqError::CatalogLoad(format!(
                    "type '{raw}' expects {n} parameter(s), got {}",
                    params.len()
                )));
            }
            Ok(())
        };

        let t = match base {
            "list" => {
                arity(1)?;
                TypeExpr::List(Box::new(TypeExpr::decode(params[0])?))
            }
            "map" => {
                arity(2)?;
                TypeExpr::Map {
                    key: Box::new(TypeExpr::decode(params[0])?),
                    value: Box::new(TypeExpr::decode(params[1])?),
                }
            }
            "decimal" => {
                arity(2)?;
                TypeExpr::Decimal {
                    precision: decode_param(params[0]),
                    scale: decode_param(params[1]),
                }
            }
            "varchar" => {
                arity(1)?;
                TypeExpr::VarChar(decode_param(params[0]))
            }
            "fixedchar" => {
                arity(1)?;
                TypeExpr::FixedChar(decode_param(params[0]))
            }
            "fixedbinary" => {
                arity(1)?;
                TypeExpr::FixedBinary(decode_param(params[0]))
            }
            "struct" => {
                if params.is_empty() {
                    return Err(FfqError::CatalogLoad(format!(
                        "struct type '{raw}' has no fields"
                    )));
                }
                TypeExpr::Struct(
                    params
                        .iter()
                        .map(|p| TypeExpr::decode(p))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            other => {
                return Err(FfqError::CatalogLoad(format!(
                    "unsupported parameterized type '{other}'"
                )))
            }
        };
        Ok(t)
    }

    /// Signature token of this type, e.g. `i32`, `dec<P1,S1>`, `list<str>`.
    pub fn signature(&self) -> String {
        match self {
            TypeExpr::Simple(s) => s.token().to_string(),
            TypeExpr::FixedChar(l) => format!("fchar<{l}>"),
            TypeExpr::VarChar(l) => format!("vchar<{l}>"),
            TypeExpr::FixedBinary(l) => format!("fbin<{l}>"),
            TypeExpr::Decimal { precision, scale } => format!("dec<{precision},{scale}>"),
            TypeExpr::List(e) => format!("list<{}>", e.signature()),
            TypeExpr::Map { key, value } => {
                format!("map<{},{}>", key.signature(), value.signature())
            }
            TypeExpr::Struct(fields) => format!(
                "struct<{}>",
                fields
                    .iter()
                    .map(TypeExpr::signature)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            TypeExpr::UserDefined(name) => format!("u!{name}"),
            TypeExpr::Variable(name) => name.clone(),
        }
    }

    /// True when no type variable or symbolic parameter occurs anywhere.
    pub fn is_concrete(&self) -> bool {
        match self {
            TypeExpr::Simple(_) | TypeExpr::UserDefined(_) => true,
            TypeExpr::Variable(_) => false,
            TypeExpr::FixedChar(l) | TypeExpr::VarChar(l) | TypeExpr::FixedBinary(l) => {
                matches!(l, TypeParam::Value(_))
            }
            TypeExpr::Decimal { precision, scale } => {
                matches!(precision, TypeParam::Value(_)) && matches!(scale, TypeParam::Value(_))
            }
            TypeExpr::List(e) => e.is_concrete(),
            TypeExpr::Map { key, value } => key.is_concrete() && value.is_concrete(),
            TypeExpr::Struct(fields) => fields.iter().all(TypeExpr::is_concrete),
        }
    }

    /// Whether this is the `unknown` placeholder type.
    pub fn is_unknown(&self) -> bool {
        matches!(self, TypeExpr::UserDefined(name) if name == UNKNOWN_TYPE)
    }

    /// Unifies this pattern with a concrete type, extending `bindings`.
    ///
    /// On failure `bindings` may hold partial state and should be discarded.
    pub fn unify(&self, concrete: &TypeExpr, bindings: &mut Bindings) -> bool {
        match (self, concrete) {
            (TypeExpr::Variable(name), c) => bindings.bind_type(name, c),
            (TypeExpr::Simple(a), TypeExpr::Simple(b)) => a == b,
            (TypeExpr::FixedChar(a), TypeExpr::FixedChar(b))
            | (TypeExpr::VarChar(a), TypeExpr::VarChar(b))
            | (TypeExpr::FixedBinary(a), TypeExpr::FixedBinary(b)) => bindings.bind_param(a, b),
            (
                TypeExpr::Decimal { precision, scale },
                TypeExpr::Decimal {
                    precision: p2,
                    scale: s2,
                },
            ) => bindings.bind_param(precision, p2) && bindings.bind_param(scale, s2),
            (TypeExpr::List(a), TypeExpr::List(b)) => a.unify(b, bindings),
            (
                TypeExpr::Map { key, value },
                TypeExpr::Map {
                    key: k2,
                    value: v2,
                },
            ) => key.unify(k2, bindings) && value.unify(v2, bindings),
            (TypeExpr::Struct(a), TypeExpr::Struct(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.unify(y, bindings))
            }
            (TypeExpr::UserDefined(a), TypeExpr::UserDefined(b)) => a == b,
            _ => false,
        }
    }

    /// Replaces bound symbols; `None` if some symbol is still unbound.
    pub fn substitute(&self, bindings: &Bindings) -> Option<TypeExpr> {
        let param = |p: &TypeParam| match p {
            TypeParam::Value(v) => Some(TypeParam::Value(*v)),
            TypeParam::Variable(name) => bindings.params.get(name).map(|v| TypeParam::Value(*v)),
        };
        let t = match self {
            TypeExpr::Variable(name) => bindings.types.get(name)?.clone(),
            TypeExpr::Simple(_) | TypeExpr::UserDefined(_) => self.clone(),
            TypeExpr::FixedChar(l) => TypeExpr::FixedChar(param(l)?),
            TypeExpr::VarChar(l) => TypeExpr::VarChar(param(l)?),
            TypeExpr::FixedBinary(l) => TypeExpr::FixedBinary(param(l)?),
            TypeExpr::Decimal { precision, scale } => TypeExpr::Decimal {
                precision: param(precision)?,
                scale: param(scale)?,
            },
            TypeExpr::List(e) => TypeExpr::List(Box::new(e.substitute(bindings)?)),
            TypeExpr::Map { key, value } => TypeExpr::Map {
                key: Box::new(key.substitute(bindings)?),
                value: Box::new(value.substitute(bindings)?),
            },
            TypeExpr::Struct(fields) => TypeExpr::Struct(
                fields
                    .iter()
                    .map(|f| f.substitute(bindings))
                    .collect::<Option<Vec<_>>>()?,
            ),
        };
        Some(t)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Symbol assignments accumulated during one pattern match.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    types: HashMap<String, TypeExpr>,
    params: HashMap<String, i64>,
}

impl Bindings {
    fn bind_type(&mut self, name: &str, concrete: &TypeExpr) -> bool {
        match self.types.get(name) {
            Some(bound) => bound == concrete,
            None => {
                self.types.insert(name.to_string(), concrete.clone());
                true
            }
        }
    }

    fn bind_param(&mut self, pattern: &TypeParam, concrete: &TypeParam) -> bool {
        let TypeParam::Value(v) = concrete else {
            return false;
        };
        match pattern {
            TypeParam::Value(p) => p == v,
            TypeParam::Variable(name) => match self.params.get(name) {
                Some(bound) => bound == v,
                None => {
                    self.params.insert(name.clone(), *v);
                    true
                }
            },
        }
    }
}

/// `any`, `any1`, ... and `T` are type variables.
pub fn is_type_variable(raw: &str) -> bool {
    raw == "T" || raw.to_ascii_lowercase().starts_with("any")
}

fn decode_param(raw: &str) -> TypeParam {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(v) => TypeParam::Value(v),
        Err(_) => TypeParam::Variable(raw.to_string()),
    }
}

/// Splits on commas that are not nested inside angle brackets.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = s[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TypeExpr {
        TypeExpr::decode(s).expect("decode")
    }

    #[test]
    fn decodes_scalar_names_case_insensitively() {
        assert_eq!(t("BOOLEAN").signature(), "bool");
        assert_eq!(t("string").signature(), "str");
        assert_eq!(t("binary").signature(), "vbin");
        assert_eq!(t("timestamp_tz").signature(), "tstz");
        assert_eq!(t("interval_day").signature(), "iday");
        assert_eq!(t("i64?").signature(), "i64");
    }

    #[test]
    fn decodes_parameterized_types() {
        assert_eq!(t("decimal<P1,S1>").signature(), "dec<P1,S1>");
        assert_eq!(t("varchar<L1>").signature(), "vchar<L1>");
        assert_eq!(t("fixedbinary<16>").signature(), "fbin<16>");
        assert_eq!(
            t("map<string, list<decimal<10,2>>>").signature(),
            "map<str,list<dec<10,2>>>"
        );
        assert_eq!(t("struct<i8,i16>").signature(), "struct<i8,i16>");
    }

    #[test]
    fn classifies_user_defined_and_variables() {
        assert!(t("unknown").is_unknown());
        assert_eq!(t("u!geo").signature(), "u!geo");
        assert_eq!(t("any1"), TypeExpr::Variable("any1".to_string()));
        assert_eq!(t("T"), TypeExpr::Variable("t".to_string()));
        assert!(!t("list<any1>").is_concrete());
        assert!(!t("decimal<P1,S1>").is_concrete());
        assert!(t("decimal<38,0>").is_concrete());
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(TypeExpr::decode("bogus").is_err());
        assert!(TypeExpr::decode("list<i8").is_err());
        assert!(TypeExpr::decode("map<i8>").is_err());
    }

    #[test]
    fn variables_bind_once_per_match() {
        let pattern = t("any1");
        let mut b = Bindings::default();
        assert!(pattern.unify(&t("fp32"), &mut b));
        assert!(pattern.unify(&t("fp32"), &mut b));
        assert!(!pattern.unify(&t("i8"), &mut b));
    }

    #[test]
    fn variable_names_ignore_case() {
        assert_eq!(t("ANY1"), t("any1"));
        let mut b = Bindings::default();
        assert!(t("ANY1").unify(&t("i64"), &mut b));
        assert!(!t("any1").unify(&t("i32"), &mut b));
        assert!(t("Any1").unify(&t("i64"), &mut b));
    }

    #[test]
    fn symbolic_parameters_bind_and_substitute() {
        let pattern = t("decimal<P1,S1>");
        let mut b = Bindings::default();
        assert!(pattern.unify(&t("decimal<10,2>"), &mut b));
        assert!(!pattern.unify(&t("decimal<10,3>"), &mut b));
        assert_eq!(
            pattern.substitute(&b).map(|x| x.signature()),
            Some("dec<10,2>".to_string())
        );
        assert_eq!(t("decimal<P2,S1>").substitute(&b), None);
    }
}
