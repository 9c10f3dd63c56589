//! Concrete call signatures used as function resolver queries.

use std::fmt;

use crate::function::signature_key;
use crate::types::TypeExpr;

/// Concrete call shape looked up in the catalog: a function name plus the
/// types of its value arguments, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: String,
    pub args: Vec<TypeExpr>,
    /// Expected result type; when set, it takes part in wildcard binding.
    pub return_type: Option<TypeExpr>,
}

impl Signature {
    pub fn new(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            args,
            return_type: None,
        }
    }

    pub fn with_return_type(mut self, return_type: TypeExpr) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Deterministic key, e.g. `lt:i8_i8`.
    pub fn key(&self) -> String {
        signature_key(&self.name, self.args.iter().map(TypeExpr::signature))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
