//! Signature resolution against the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::Catalog;
use crate::function::{FunctionKind, FunctionVariant};
use crate::mappings::FunctionMappings;
use crate::signature::Signature;

#[derive(Debug, Default)]
struct NameBucket {
    direct: HashMap<String, Arc<FunctionVariant>>,
    intermediate: HashMap<String, Arc<FunctionVariant>>,
    patterns: Vec<Arc<FunctionVariant>>,
}

/// Resolves concrete call signatures of one [`FunctionKind`] to catalog variants.
///
/// Built once from an immutable [`Catalog`]; lookups take `&self` and the
/// resolver can be shared across threads.
#[derive(Debug)]
pub struct FunctionResolver {
    kind: FunctionKind,
    mappings: Arc<FunctionMappings>,
    buckets: HashMap<String, NameBucket>,
}

impl FunctionResolver {
    pub fn new(kind: FunctionKind, catalog: &Catalog, mappings: Arc<FunctionMappings>) -> Self {
        let mut buckets: HashMap<String, NameBucket> = HashMap::new();
        for variant in catalog.functions(kind) {
            let bucket = buckets.entry(variant.name.clone()).or_default();
            bucket
                .direct
                .entry(variant.signature())
                .or_insert_with(|| variant.clone());
            bucket
                .direct
                .entry(variant.required_signature())
                .or_insert_with(|| variant.clone());
            if let Some(key) = variant.intermediate_signature() {
                bucket
                    .intermediate
                    .entry(key)
                    .or_insert_with(|| variant.clone());
            }
            if variant.is_pattern() {
                bucket.patterns.push(variant.clone());
            }
        }
        Self {
            kind,
            mappings,
            buckets,
        }
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn mappings(&self) -> &FunctionMappings {
        &self.mappings
    }

    /// Finds the variant for `signature`, whose name is a native name.
    ///
    /// Checks exact keys first, then intermediate-state keys, then wildcard
    /// and variadic patterns in catalog order. A miss is `None`; callers
    /// decide whether it is fatal.
    pub fn lookup(&self, signature: &Signature) -> Option<Arc<FunctionVariant>> {
        let name = self.mappings.to_interchange(self.kind, &signature.name);
        let bucket = self.buckets.get(name)?;

        let mapped = Signature {
            name: name.to_string(),
            args: signature.args.clone(),
            return_type: signature.return_type.clone(),
        };
        let key = mapped.key();
        if let Some(v) = bucket.direct.get(&key) {
            return Some(v.clone());
        }
        if let Some(v) = bucket.intermediate.get(&key) {
            return Some(v.clone());
        }
        if mapped.args.is_empty() {
            return None;
        }

        debug!(
            operator = "FunctionLookup",
            kind = %self.kind,
            signature = %key,
            candidates = bucket.patterns.len(),
            "no exact match, trying wildcard variants"
        );
        bucket
            .patterns
            .iter()
            .find_map(|p| p.match_types(&mapped.args, mapped.return_type.as_ref()))
            .map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::types::TypeExpr;
    use serde_json::json;

    fn t(s: &str) -> TypeExpr {
        TypeExpr::decode(s).expect("type")
    }

    fn resolver(kind: FunctionKind) -> FunctionResolver {
        let doc = json!({
            "scalar_functions": [
                {"name": "add", "impls": [
                    {"args": [{"options": ["SILENT", "ERROR"]}, {"value": "i8"}, {"value": "i8"}], "return": "i8"}
                ]},
                {"name": "test", "impls": [
                    {"args": [{"value": "any1"}, {"value": "any1"}], "return": "any1"},
                    {"args": [{"value": "any1"}, {"value": "any2"}, {"value": "any1"}], "return": "any2"}
                ]}
            ],
            "aggregate_functions": [
                {"name": "sum", "impls": [
                    {"args": [{"value": "i32"}], "intermediate": "i64", "return": "i64"}
                ]}
            ]
        });
        let catalog = Catalog::load(&[CatalogSource::new("/test.yaml", doc)]).expect("catalog");
        FunctionResolver::new(kind, &catalog, Arc::new(FunctionMappings::default()))
    }

    #[test]
    fn mapped_name_resolves_through_required_arguments() {
        let r = resolver(FunctionKind::Scalar);
        let v = r
            .lookup(&Signature::new("plus", vec![t("i8"), t("i8")]))
            .expect("plus");
        assert_eq!(v.signature(), "add:opt_i8_i8");
        assert!(r
            .lookup(&Signature::new("plus", vec![t("i16"), t("i16")]))
            .is_none());
    }

    #[test]
    fn wildcard_positions_must_bind_consistently() {
        let r = resolver(FunctionKind::Scalar);
        let m = r
            .lookup(&Signature::new("test", vec![t("fp32"), t("fp32")]))
            .expect("same types");
        assert_eq!(m.signature(), "test:fp32_fp32");
        assert!(r
            .lookup(&Signature::new("test", vec![t("fp32"), t("i8")]))
            .is_none());
        let m = r
            .lookup(&Signature::new("test", vec![t("i8"), t("i16"), t("i8")]))
            .expect("three args");
        assert_eq!(m.return_type, t("i16"));
        assert!(r
            .lookup(&Signature::new("test", vec![t("i8"), t("i16"), t("i32")]))
            .is_none());
    }

    #[test]
    fn return_type_joins_the_binding() {
        let r = resolver(FunctionKind::Scalar);
        let sig = Signature::new("test", vec![t("i8"), t("i8")]).with_return_type(t("i16"));
        assert!(r.lookup(&sig).is_none());
    }

    #[test]
    fn aggregate_resolves_by_intermediate_type() {
        let r = resolver(FunctionKind::Aggregate);
        let by_input = r.lookup(&Signature::new("sum", vec![t("i32")])).expect("input");
        let by_state = r.lookup(&Signature::new("sum", vec![t("i64")])).expect("state");
        assert_eq!(by_input, by_state);
    }

    #[test]
    fn repeated_lookups_are_deterministic() {
        let r = resolver(FunctionKind::Scalar);
        let sig = Signature::new("test", vec![t("i64"), t("i64")]);
        let first = r.lookup(&sig).expect("first");
        for _ in 0..10 {
            assert_eq!(r.lookup(&sig).expect("again"), first);
        }
    }

    #[test]
    fn zero_argument_queries_never_match_patterns() {
        let r = resolver(FunctionKind::Scalar);
        assert!(r.lookup(&Signature::new("test", vec![])).is_none());
        assert!(r.lookup(&Signature::new("missing", vec![t("i8")])).is_none());
    }
}
