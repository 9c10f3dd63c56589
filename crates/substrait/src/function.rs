//! Function variants declared by extension catalogs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Bindings, TypeExpr};

/// Which resolver a variant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Scalar => f.write_str("scalar"),
            FunctionKind::Aggregate => f.write_str("aggregate"),
        }
    }
}

/// One positional argument of a function variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionArgument {
    /// Argument carrying a value of the given type.
    Value(TypeExpr),
    /// Bare type argument without a value.
    Type,
    /// Option argument selecting behaviour, e.g. overflow handling.
    Enum { options: Vec<String>, required: bool },
}

impl FunctionArgument {
    /// Token this argument contributes to a signature key.
    pub fn token(&self) -> String {
        match self {
            FunctionArgument::Value(t) => t.signature(),
            FunctionArgument::Type => "type".to_string(),
            FunctionArgument::Enum { required: true, .. } => "req".to_string(),
            FunctionArgument::Enum { required: false, .. } => "opt".to_string(),
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, FunctionArgument::Enum { required: false, .. })
    }

    pub fn value_type(&self) -> Option<&TypeExpr> {
        match self {
            FunctionArgument::Value(t) => Some(t),
            _ => None,
        }
    }
}

/// Bounds on how often the last value argument may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variadic {
    pub min: usize,
    pub max: Option<usize>,
}

/// Catalog-wide identity of a variant: its source uri and signature key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionAnchor {
    pub uri: String,
    pub key: String,
}

/// One concrete overload of a scalar or aggregate function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionVariant {
    pub name: String,
    pub uri: String,
    pub kind: FunctionKind,
    pub args: Vec<FunctionArgument>,
    pub return_type: TypeExpr,
    /// Intermediate state type; aggregates only.
    pub intermediate: Option<TypeExpr>,
    pub variadic: Option<Variadic>,
}

/// `name` alone without arguments, else `name:tok1_tok2_...`.
pub fn signature_key<I>(name: &str, tokens: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let tokens = tokens.into_iter().collect::<Vec<_>>();
    if tokens.is_empty() {
        name.to_string()
    } else {
        format!("{name}:{}", tokens.join("_"))
    }
}

impl FunctionVariant {
    /// Full signature key, e.g. `add:opt_i8_i8`.
    pub fn signature(&self) -> String {
        signature_key(&self.name, self.args.iter().map(FunctionArgument::token))
    }

    /// Key over required arguments only, e.g. `add:i8_i8`.
    pub fn required_signature(&self) -> String {
        signature_key(
            &self.name,
            self.args
                .iter()
                .filter(|a| a.is_required())
                .map(FunctionArgument::token),
        )
    }

    /// Key phrased over the intermediate state type, e.g. `sum:i64`.
    pub fn intermediate_signature(&self) -> Option<String> {
        self.intermediate
            .as_ref()
            .map(|t| format!("{}:{}", self.name, t.signature()))
    }

    pub fn anchor(&self) -> FunctionAnchor {
        FunctionAnchor {
            uri: self.uri.clone(),
            key: self.signature(),
        }
    }

    pub fn value_types(&self) -> impl Iterator<Item = &TypeExpr> {
        self.args.iter().filter_map(FunctionArgument::value_type)
    }

    /// True when matching needs unification rather than a key lookup.
    pub fn is_pattern(&self) -> bool {
        self.variadic.is_some() || self.value_types().any(|t| !t.is_concrete())
    }

    /// Matches value arguments (and return type, when given) against the
    /// query under one consistent set of bindings.
    ///
    /// Returns the variant specialized to the concrete query types.
    pub fn match_types(
        &self,
        query_args: &[TypeExpr],
        query_return: Option<&TypeExpr>,
    ) -> Option<FunctionVariant> {
        let pattern = self.expand_values(query_args.len())?;
        let mut bindings = Bindings::default();
        let consistent = pattern
            .iter()
            .zip(query_args)
            .all(|(p, q)| p.unify(q, &mut bindings));
        if !consistent {
            return None;
        }
        if let Some(ret) = query_return {
            if !self.return_type.unify(ret, &mut bindings) {
                return None;
            }
        }

        let mut values = query_args.iter().cloned();
        let mut args = Vec::with_capacity(self.args.len() + query_args.len());
        for a in &self.args {
            match a {
                FunctionArgument::Value(_) => args.push(FunctionArgument::Value(values.next()?)),
                other => args.push(other.clone()),
            }
        }
        args.extend(values.map(FunctionArgument::Value));

        Some(FunctionVariant {
            name: self.name.clone(),
            uri: self.uri.clone(),
            kind: self.kind,
            args,
            return_type: self
                .return_type
                .substitute(&bindings)
                .unwrap_or_else(|| self.return_type.clone()),
            intermediate: self
                .intermediate
                .as_ref()
                .map(|t| t.substitute(&bindings).unwrap_or_else(|| t.clone())),
            variadic: None,
        })
    }

    /// Value-argument pattern stretched to `arity` positions, if allowed.
    fn expand_values(&self, arity: usize) -> Option<Vec<&TypeExpr>> {
        let values = self.value_types().collect::<Vec<_>>();
        match self.variadic {
            None if values.len() == arity => Some(values),
            None => None,
            Some(v) => {
                let last = *values.last()?;
                let fixed = values.len() - 1;
                if arity < fixed {
                    return None;
                }
                let repeats = arity - fixed;
                if repeats < v.min || v.max.is_some_and(|max| repeats > max) {
                    return None;
                }
                let mut out = values[..fixed].to_vec();
                out.extend(std::iter::repeat(last).take(repeats));
                Some(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> FunctionArgument {
        FunctionArgument::Value(TypeExpr::decode(s).expect("type"))
    }

    fn variant(name: &str, args: Vec<FunctionArgument>, ret: &str) -> FunctionVariant {
        FunctionVariant {
            name: name.to_string(),
            uri: "/functions_test.yaml".to_string(),
            kind: FunctionKind::Scalar,
            args,
            return_type: TypeExpr::decode(ret).expect("type"),
            intermediate: None,
            variadic: None,
        }
    }

    #[test]
    fn signature_keys_follow_argument_tokens() {
        let add = variant(
            "add",
            vec![
                FunctionArgument::Enum {
                    options: vec!["SILENT".to_string(), "ERROR".to_string()],
                    required: false,
                },
                value("i8"),
                value("i8"),
            ],
            "i8",
        );
        assert_eq!(add.signature(), "add:opt_i8_i8");
        assert_eq!(add.required_signature(), "add:i8_i8");
        assert!(!add.is_pattern());

        let now = variant("now", vec![], "timestamp");
        assert_eq!(now.signature(), "now");
    }

    #[test]
    fn wildcard_match_specializes_arguments() {
        let v = variant("test", vec![value("any1"), value("any1")], "any1");
        let fp32 = TypeExpr::decode("fp32").expect("type");
        let i8t = TypeExpr::decode("i8").expect("type");

        let m = v.match_types(&[fp32.clone(), fp32.clone()], None).expect("match");
        assert_eq!(m.signature(), "test:fp32_fp32");
        assert_eq!(m.return_type, fp32);
        assert!(v.match_types(&[fp32, i8t], None).is_none());
    }

    #[test]
    fn variadic_repeats_last_argument() {
        let mut concat = variant("concat", vec![value("varchar<L1>")], "varchar<L1>");
        concat.variadic = Some(Variadic { min: 1, max: None });
        let s = TypeExpr::decode("varchar<5>").expect("type");

        let m = concat
            .match_types(&[s.clone(), s.clone(), s.clone()], None)
            .expect("match");
        assert_eq!(m.signature(), "concat:vchar<5>_vchar<5>_vchar<5>");
        assert!(concat.match_types(&[], None).is_none());
    }
}
