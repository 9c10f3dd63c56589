//! Extension catalog loading and merging.
//!
//! Catalog sources arrive as already-parsed structured documents (the JSON
//! rendering of the extension YAML files). Each document may declare scalar
//! functions, aggregate functions and types. Entries that are individually
//! malformed are skipped with a warning; a document whose top-level shape
//! cannot be decoded fails the whole load.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ffq_common::{FfqError, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::function::{FunctionArgument, FunctionKind, FunctionVariant, Variadic};
use crate::types::TypeExpr;

/// One named catalog document.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    pub uri: String,
    pub document: Value,
}

impl CatalogSource {
    pub fn new(uri: impl Into<String>, document: Value) -> Self {
        Self {
            uri: uri.into(),
            document,
        }
    }

    /// Parses `text` as a JSON catalog document.
    pub fn from_json_str(uri: impl Into<String>, text: &str) -> Result<Self> {
        let uri = uri.into();
        let document = serde_json::from_str(text)
            .map_err(|e| FfqError::CatalogLoad(format!("{uri}: {e}")))?;
        Ok(Self { uri, document })
    }
}

/// User-defined type declared by a catalog source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeAnchor {
    pub uri: String,
    pub name: String,
}

/// Immutable union of all loaded catalog entries.
///
/// Entries are kept in load order and never deduplicated: several variants
/// sharing a name are overloads.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    scalar: Vec<Arc<FunctionVariant>>,
    aggregate: Vec<Arc<FunctionVariant>>,
    types: Vec<TypeAnchor>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    types: Vec<Value>,
    #[serde(default)]
    scalar_functions: Vec<Value>,
    #[serde(default)]
    aggregate_functions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    impls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawImpl {
    #[serde(default)]
    args: Vec<RawArg>,
    #[serde(rename = "return")]
    return_type: String,
    #[serde(default)]
    intermediate: Option<String>,
    #[serde(default)]
    variadic: Option<RawVariadic>,
}

#[derive(Debug, Deserialize)]
struct RawArg {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    required: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawVariadic {
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
}

/// URIs under which the bundled extension documents are published.
pub const BUILTIN_URI_PREFIX: &str =
    "https://github.com/substrait-io/substrait/blob/main/extensions/";

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    (
        "functions_comparison.yaml",
        include_str!("../extensions/functions_comparison.json"),
    ),
    (
        "functions_boolean.yaml",
        include_str!("../extensions/functions_boolean.json"),
    ),
    (
        "functions_arithmetic.yaml",
        include_str!("../extensions/functions_arithmetic.json"),
    ),
    (
        "functions_aggregate_generic.yaml",
        include_str!("../extensions/functions_aggregate_generic.json"),
    ),
    (
        "unknown.yaml",
        include_str!("../extensions/unknown.json"),
    ),
];

impl Catalog {
    /// Decodes and unions all sources, in order.
    pub fn load(sources: &[CatalogSource]) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        for source in sources {
            catalog.add_source(source)?;
        }
        info!(
            operator = "CatalogLoad",
            sources = sources.len(),
            scalar_functions = catalog.scalar.len(),
            aggregate_functions = catalog.aggregate.len(),
            types = catalog.types.len(),
            "extension catalog built"
        );
        Ok(catalog)
    }

    /// Catalog built from the bundled extension documents.
    pub fn builtin() -> Result<Catalog> {
        let sources = BUILTIN_SOURCES
            .iter()
            .map(|(file, text)| {
                CatalogSource::from_json_str(format!("{BUILTIN_URI_PREFIX}{file}"), text)
            })
            .collect::<Result<Vec<_>>>()?;
        Catalog::load(&sources)
    }

    /// Loads JSON catalog documents from disk; each path doubles as the uri.
    pub fn load_json_files<P: AsRef<Path>>(paths: &[P]) -> Result<Catalog> {
        let sources = paths
            .iter()
            .map(|p| {
                let path = p.as_ref();
                let text = fs::read_to_string(path)?;
                CatalogSource::from_json_str(path.display().to_string(), &text)
            })
            .collect::<Result<Vec<_>>>()?;
        Catalog::load(&sources)
    }

    /// Union of two catalogs; `self`'s entries precede `other`'s.
    pub fn merge(mut self, other: Catalog) -> Catalog {
        self.scalar.extend(other.scalar);
        self.aggregate.extend(other.aggregate);
        self.types.extend(other.types);
        self
    }

    pub fn functions(&self, kind: FunctionKind) -> &[Arc<FunctionVariant>] {
        match kind {
            FunctionKind::Scalar => &self.scalar,
            FunctionKind::Aggregate => &self.aggregate,
        }
    }

    pub fn types(&self) -> &[TypeAnchor] {
        &self.types
    }

    /// First declared type named `name`, compared case-insensitively.
    pub fn find_type(&self, name: &str) -> Option<&TypeAnchor> {
        self.types.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn add_source(&mut self, source: &CatalogSource) -> Result<()> {
        let doc: RawDocument = serde_json::from_value(source.document.clone())
            .map_err(|e| FfqError::CatalogLoad(format!("{}: {e}", source.uri)))?;

        for raw in doc.types {
            match serde_json::from_value::<RawType>(raw) {
                Ok(t) => self.types.push(TypeAnchor {
                    uri: source.uri.clone(),
                    name: t.name,
                }),
                Err(e) => warn!(uri = %source.uri, error = %e, "skipping malformed type entry"),
            }
        }
        for raw in doc.scalar_functions {
            let variants = decode_function(&source.uri, FunctionKind::Scalar, raw);
            self.scalar.extend(variants.into_iter().map(Arc::new));
        }
        for raw in doc.aggregate_functions {
            let variants = decode_function(&source.uri, FunctionKind::Aggregate, raw);
            self.aggregate.extend(variants.into_iter().map(Arc::new));
        }
        Ok(())
    }
}

fn decode_function(uri: &str, kind: FunctionKind, raw: Value) -> Vec<FunctionVariant> {
    let func: RawFunction = match serde_json::from_value(raw) {
        Ok(f) => f,
        Err(e) => {
            warn!(uri, %kind, error = %e, "skipping malformed function entry");
            return Vec::new();
        }
    };
    let mut out = Vec::with_capacity(func.impls.len());
    for raw_impl in func.impls {
        match decode_impl(uri, kind, &func.name, raw_impl) {
            Ok(v) => out.push(v),
            Err(e) => warn!(
                uri,
                %kind,
                function = %func.name,
                error = %e,
                "skipping malformed function implementation"
            ),
        }
    }
    out
}

fn decode_impl(uri: &str, kind: FunctionKind, name: &str, raw: Value) -> Result<FunctionVariant> {
    let imp: RawImpl =
        serde_json::from_value(raw).map_err(|e| FfqError::CatalogLoad(e.to_string()))?;

    let return_line = imp
        .return_type
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| FfqError::CatalogLoad("empty return type".to_string()))?;
    let return_type = TypeExpr::decode(return_line)?;

    let args = imp
        .args
        .into_iter()
        .map(|a| match (a.options, a.value) {
            (Some(options), _) => Ok(FunctionArgument::Enum {
                options,
                required: a.required.unwrap_or(false),
            }),
            (None, Some(value)) => Ok(FunctionArgument::Value(TypeExpr::decode(&value)?)),
            (None, None) => Ok(FunctionArgument::Type),
        })
        .collect::<Result<Vec<_>>>()?;

    let intermediate = match (kind, imp.intermediate) {
        (FunctionKind::Aggregate, Some(t)) => Some(TypeExpr::decode(&t)?),
        _ => None,
    };

    Ok(FunctionVariant {
        name: name.to_string(),
        uri: uri.to_string(),
        kind,
        args,
        return_type,
        intermediate,
        variadic: imp.variadic.map(|v| Variadic {
            min: v.min.unwrap_or(0),
            max: v.max,
        }),
    })
}
