//! Static name differences between native and interchange functions.

use std::collections::HashMap;

use crate::function::FunctionKind;

/// Bidirectional native ↔ interchange function-name table.
///
/// Names absent from the table are identical on both sides.
#[derive(Debug, Clone)]
pub struct FunctionMappings {
    scalar: HashMap<String, String>,
    aggregate: HashMap<String, String>,
    scalar_reverse: HashMap<String, String>,
    aggregate_reverse: HashMap<String, String>,
}

const SCALAR_MAPPINGS: &[(&str, &str)] = &[
    ("plus", "add"),
    ("minus", "subtract"),
    ("mod", "modulus"),
    ("eq", "equal"),
    ("neq", "not_equal"),
    ("substr", "substring"),
];

impl Default for FunctionMappings {
    fn default() -> Self {
        Self::new(SCALAR_MAPPINGS, &[])
    }
}

impl FunctionMappings {
    /// Builds a table from `(native, interchange)` pairs.
    pub fn new(scalar: &[(&str, &str)], aggregate: &[(&str, &str)]) -> Self {
        let forward = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(n, i)| (n.to_string(), i.to_string()))
                .collect::<HashMap<_, _>>()
        };
        let reverse = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(n, i)| (i.to_string(), n.to_string()))
                .collect::<HashMap<_, _>>()
        };
        Self {
            scalar: forward(scalar),
            aggregate: forward(aggregate),
            scalar_reverse: reverse(scalar),
            aggregate_reverse: reverse(aggregate),
        }
    }

    /// Interchange name for a native function name.
    pub fn to_interchange<'a>(&'a self, kind: FunctionKind, native: &'a str) -> &'a str {
        let table = match kind {
            FunctionKind::Scalar => &self.scalar,
            FunctionKind::Aggregate => &self.aggregate,
        };
        table.get(native).map(String::as_str).unwrap_or(native)
    }

    /// Native name for an interchange function name.
    pub fn to_native<'a>(&'a self, kind: FunctionKind, interchange: &'a str) -> &'a str {
        let table = match kind {
            FunctionKind::Scalar => &self.scalar_reverse,
            FunctionKind::Aggregate => &self.aggregate_reverse,
        };
        table
            .get(interchange)
            .map(String::as_str)
            .unwrap_or(interchange)
    }

    /// Renames the function part of a signature key (`plus:i8_i8` → `add:i8_i8`).
    pub fn map_signature_key(&self, kind: FunctionKind, key: &str) -> String {
        match key.split_once(':') {
            Some((name, rest)) => format!("{}:{rest}", self.to_interchange(kind, name)),
            None => self.to_interchange(kind, key).to_string(),
        }
    }
}
