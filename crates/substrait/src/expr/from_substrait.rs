use arrow_schema::Schema;
use ffq_common::{FfqError, Result};
use ffq_planner::Expr;

use super::IF_FUNCTION;
use crate::context::InboundContext;
use crate::function::FunctionKind;
use crate::literal::from_proto_literal;
use crate::proto::{Expression, FunctionArgument};

/// Converts an interchange expression evaluated against `schema`.
pub fn from_proto_expr(
    e: &Expression,
    schema: &Schema,
    ctx: &InboundContext<'_>,
    depth: usize,
) -> Result<Expr> {
    ctx.check_expr_depth(depth)?;
    match e {
        Expression::Literal(lit) => Ok(Expr::Literal(from_proto_literal(lit, ctx)?)),
        Expression::Selection(r) => Expr::column(schema, r.field as usize),
        Expression::ScalarFunction(f) => {
            let name = ctx.native_name(f.function_reference, FunctionKind::Scalar)?;
            let args = value_arguments(&f.arguments, schema, ctx, depth)?;
            let output = f.output_type.as_ref().ok_or_else(|| {
                FfqError::Structural(format!("scalar function '{name}' has no output type"))
            })?;
            Ok(Expr::call(name, args, ctx.convert_type(output)?))
        }
        Expression::IfThen(it) => {
            if it.ifs.is_empty() {
                return Err(FfqError::Structural("if-then without clauses".to_string()));
            }
            let otherwise = it
                .r#else
                .as_ref()
                .ok_or_else(|| FfqError::Structural("if-then without else".to_string()))?;
            let mut args = Vec::with_capacity(it.ifs.len() * 2 + 1);
            for clause in &it.ifs {
                args.push(from_proto_expr(&clause.r#if, schema, ctx, depth + 1)?);
                args.push(from_proto_expr(&clause.then, schema, ctx, depth + 1)?);
            }
            let otherwise = from_proto_expr(otherwise, schema, ctx, depth + 1)?;
            // Typed by the first branch that is not a null literal.
            let return_type = args
                .iter()
                .skip(1)
                .step_by(2)
                .find(|then| !matches!(then, Expr::Literal(v) if v.is_null()))
                .unwrap_or(&otherwise)
                .data_type();
            args.push(otherwise);
            Ok(Expr::call(IF_FUNCTION, args, return_type))
        }
    }
}

/// Converts the value arguments of a call; enum and type arguments carry no
/// native operand and are skipped.
pub fn value_arguments(
    args: &[FunctionArgument],
    schema: &Schema,
    ctx: &InboundContext<'_>,
    depth: usize,
) -> Result<Vec<Expr>> {
    args.iter()
        .filter_map(|a| match a {
            FunctionArgument::Value(e) => Some(from_proto_expr(e, schema, ctx, depth + 1)),
            _ => None,
        })
        .collect()
}
