//! Join condition decomposition and join-type mapping.

use ffq_common::{FfqError, Result};
use ffq_planner::JoinType;

use crate::context::InboundContext;
use crate::filter::AND_FUNCTION;
use crate::function::FunctionKind;
use crate::proto::{Expression, FunctionArgument, JoinRelType};

/// Native name of the equality used for join keys.
pub const EQ_FUNCTION: &str = "eq";

pub fn join_type_from_proto(t: JoinRelType) -> Result<JoinType> {
    match t {
        JoinRelType::Inner => Ok(JoinType::Inner),
        JoinRelType::Left => Ok(JoinType::Left),
        JoinRelType::Right => Ok(JoinType::Right),
        JoinRelType::Outer => Ok(JoinType::Full),
        JoinRelType::Semi => Ok(JoinType::LeftSemi),
        JoinRelType::Anti => Ok(JoinType::Anti),
        other => Err(FfqError::Unsupported(format!("join type {other:?}"))),
    }
}

/// Only inner equi joins are emitted.
pub fn join_type_to_proto(t: JoinType) -> Result<JoinRelType> {
    match t {
        JoinType::Inner => Ok(JoinRelType::Inner),
        other => Err(FfqError::Unsupported(format!(
            "join type {other:?} cannot be emitted"
        ))),
    }
}

/// Equi-join key columns, left keys index the left input and right keys the
/// right input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinKeys {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

/// Decomposes a join condition over `left ++ right` fields into key pairs.
///
/// The condition must be `eq` of two field references or an `and` tree of
/// such leaves. Anything else is fatal; no residual is extracted.
pub fn extract_join_keys(
    condition: &Expression,
    left_len: usize,
    right_len: usize,
    ctx: &InboundContext<'_>,
) -> Result<JoinKeys> {
    let mut keys = JoinKeys::default();
    collect_keys(condition, left_len, right_len, ctx, &mut keys)?;
    Ok(keys)
}

fn collect_keys(
    e: &Expression,
    left_len: usize,
    right_len: usize,
    ctx: &InboundContext<'_>,
    keys: &mut JoinKeys,
) -> Result<()> {
    let Expression::ScalarFunction(f) = e else {
        return Err(FfqError::Unsupported(
            "join condition must be a conjunction of equalities".to_string(),
        ));
    };
    let name = ctx.native_name(f.function_reference, FunctionKind::Scalar)?;
    let values = f.arguments.iter().filter_map(|a| match a {
        FunctionArgument::Value(v) => Some(v),
        _ => None,
    });

    match name.as_str() {
        AND_FUNCTION => {
            for v in values {
                collect_keys(v, left_len, right_len, ctx, keys)?;
            }
            Ok(())
        }
        EQ_FUNCTION => {
            let fields = values
                .map(|v| match v {
                    Expression::Selection(r) => Ok(r.field as usize),
                    _ => Err(FfqError::Unsupported(
                        "join key must be a direct field reference".to_string(),
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            let &[a, b] = fields.as_slice() else {
                return Err(FfqError::Structural(format!(
                    "join equality expects 2 arguments, got {}",
                    fields.len()
                )));
            };
            let total = left_len + right_len;
            if a >= total || b >= total {
                return Err(FfqError::Structural(format!(
                    "join key field out of range for {total} columns"
                )));
            }
            let (l, r) = match (a < left_len, b < left_len) {
                (true, false) => (a, b - left_len),
                (false, true) => (b, a - left_len),
                _ => {
                    return Err(FfqError::Structural(format!(
                        "join equality on fields {a} and {b} does not span both inputs"
                    )))
                }
            };
            keys.left.push(l);
            keys.right.push(r);
            Ok(())
        }
        other => Err(FfqError::Unsupported(format!(
            "join condition function '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{
        ExtensionFunctionDecl, FieldReference, Plan, ScalarFunction, SimpleExtensionDeclaration,
    };
    use crate::mappings::FunctionMappings;
    use ffq_common::ConverterConfig;

    fn header() -> Plan {
        let decl = |anchor, name: &str| {
            SimpleExtensionDeclaration::ExtensionFunction(ExtensionFunctionDecl {
                extension_uri_reference: 1,
                function_anchor: anchor,
                name: name.to_string(),
            })
        };
        Plan {
            extensions: vec![
                decl(1, "and:bool"),
                decl(2, "equal:any1_any1"),
                decl(3, "or:bool"),
            ],
            ..Plan::default()
        }
    }

    fn field(i: u32) -> Expression {
        Expression::Selection(FieldReference { field: i })
    }

    fn call(anchor: u32, args: Vec<Expression>) -> Expression {
        Expression::ScalarFunction(ScalarFunction {
            function_reference: anchor,
            arguments: args.into_iter().map(FunctionArgument::Value).collect(),
            output_type: None,
        })
    }

    fn with_ctx<T>(f: impl FnOnce(&InboundContext<'_>) -> T) -> T {
        let mappings = FunctionMappings::default();
        let config = ConverterConfig::default();
        let plan = header();
        let ctx = InboundContext::from_header(&plan, &mappings, &config).expect("header");
        f(&ctx)
    }

    #[test]
    fn conjunction_of_equalities_yields_key_pairs() {
        let cond = call(1, vec![call(2, vec![field(0), field(2)]), call(2, vec![field(1), field(3)])]);
        let keys = with_ctx(|ctx| extract_join_keys(&cond, 2, 2, ctx)).expect("keys");
        assert_eq!(keys.left, vec![0, 1]);
        assert_eq!(keys.right, vec![0, 1]);
    }

    #[test]
    fn single_equality_and_swapped_operands() {
        let cond = call(2, vec![field(3), field(1)]);
        let keys = with_ctx(|ctx| extract_join_keys(&cond, 2, 2, ctx)).expect("keys");
        assert_eq!(keys.left, vec![1]);
        assert_eq!(keys.right, vec![1]);
    }

    #[test]
    fn disjunction_is_rejected() {
        let cond = call(3, vec![call(2, vec![field(0), field(2)]), call(2, vec![field(1), field(3)])]);
        let err = with_ctx(|ctx| extract_join_keys(&cond, 2, 2, ctx)).expect_err("or");
        assert!(matches!(err, FfqError::Unsupported(_)));
    }

    #[test]
    fn keys_on_one_side_are_structural() {
        let cond = call(2, vec![field(0), field(1)]);
        let err = with_ctx(|ctx| extract_join_keys(&cond, 2, 2, ctx)).expect_err("same side");
        assert!(matches!(err, FfqError::Structural(_)));
    }

    #[test]
    fn join_type_mapping() {
        assert_eq!(join_type_from_proto(JoinRelType::Outer).expect("outer"), JoinType::Full);
        assert_eq!(join_type_from_proto(JoinRelType::Semi).expect("semi"), JoinType::LeftSemi);
        assert!(join_type_from_proto(JoinRelType::Single).is_err());
        assert!(join_type_from_proto(JoinRelType::Unspecified).is_err());
        assert_eq!(join_type_to_proto(JoinType::Inner).expect("inner"), JoinRelType::Inner);
        assert!(join_type_to_proto(JoinType::Left).is_err());
    }
}
