use arrow_schema::DataType;
use ffq_common::{FfqError, Result};
use ffq_planner::Expr;

use crate::context::OutboundContext;
use crate::function::FunctionKind;
use crate::literal::to_proto_literal;
use crate::proto::{Expression, FieldReference, FunctionArgument, IfClause, IfThen, ScalarFunction};
use crate::signature::Signature;
use crate::type_convert::to_type_expr;

/// Native name of conditional calls: `if(c1, r1, c2, r2, ..., else)`.
pub const IF_FUNCTION: &str = "if";

/// One link of the outbound call-conversion chain.
///
/// Returns `Ok(None)` to decline a call so the next converter can try it.
pub trait CallConverter: Send + Sync {
    /// Stable converter name for diagnostics.
    fn name(&self) -> &str;

    fn convert(
        &self,
        name: &str,
        args: &[Expr],
        return_type: &DataType,
        ctx: &mut OutboundContext<'_>,
        depth: usize,
    ) -> Result<Option<Expression>>;
}

/// Chain used unless an embedder registers more converters.
pub fn default_call_converters() -> Vec<Box<dyn CallConverter>> {
    vec![Box::new(IfThenConverter), Box::new(ScalarFunctionConverter)]
}

pub fn to_proto_expr(expr: &Expr, ctx: &mut OutboundContext<'_>, depth: usize) -> Result<Expression> {
    ctx.check_expr_depth(depth)?;
    match expr {
        Expr::Literal(v) => Ok(Expression::Literal(to_proto_literal(v, ctx)?)),
        Expr::Column { index, .. } => {
            let field = u32::try_from(*index).map_err(|_| {
                FfqError::Structural(format!("column index {index} does not fit a field reference"))
            })?;
            Ok(Expression::Selection(FieldReference { field }))
        }
        Expr::Call {
            name,
            args,
            return_type,
        } => {
            let chain = ctx.call_converters;
            for converter in chain {
                if let Some(e) = converter.convert(name, args, return_type, ctx, depth)? {
                    return Ok(e);
                }
            }
            Err(FfqError::FunctionLookup(format!(
                "no catalog entry for {}",
                call_signature(name, args)?
            )))
        }
    }
}

fn call_signature(name: &str, args: &[Expr]) -> Result<Signature> {
    let types = args
        .iter()
        .map(|a| to_type_expr(&a.data_type()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Signature::new(name, types))
}

fn convert_args(
    args: &[Expr],
    ctx: &mut OutboundContext<'_>,
    depth: usize,
) -> Result<Vec<FunctionArgument>> {
    args.iter()
        .map(|a| Ok(FunctionArgument::Value(to_proto_expr(a, ctx, depth + 1)?)))
        .collect()
}

/// Converts `if` calls into interchange conditionals.
#[derive(Debug, Default)]
pub struct IfThenConverter;

impl CallConverter for IfThenConverter {
    fn name(&self) -> &str {
        "if_then"
    }

    fn convert(
        &self,
        name: &str,
        args: &[Expr],
        _return_type: &DataType,
        ctx: &mut OutboundContext<'_>,
        depth: usize,
    ) -> Result<Option<Expression>> {
        if name != IF_FUNCTION {
            return Ok(None);
        }
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(FfqError::Structural(format!(
                "if expects condition/result pairs plus an else branch, got {} arguments",
                args.len()
            )));
        }
        let (pairs, tail) = args.split_at(args.len() - 1);
        let mut ifs = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            ifs.push(IfClause {
                r#if: to_proto_expr(&pair[0], ctx, depth + 1)?,
                then: to_proto_expr(&pair[1], ctx, depth + 1)?,
            });
        }
        let r#else = to_proto_expr(&tail[0], ctx, depth + 1)?;
        Ok(Some(Expression::IfThen(Box::new(IfThen {
            ifs,
            r#else: Some(r#else),
        }))))
    }
}

/// Resolves calls against the scalar catalog and references them by anchor.
#[derive(Debug, Default)]
pub struct ScalarFunctionConverter;

impl CallConverter for ScalarFunctionConverter {
    fn name(&self) -> &str {
        "scalar_function"
    }

    fn convert(
        &self,
        name: &str,
        args: &[Expr],
        return_type: &DataType,
        ctx: &mut OutboundContext<'_>,
        depth: usize,
    ) -> Result<Option<Expression>> {
        let signature = call_signature(name, args)?.with_return_type(to_type_expr(return_type)?);
        let Some(variant) = ctx.resolver(FunctionKind::Scalar).lookup(&signature) else {
            return Ok(None);
        };
        let function_reference = ctx.collector().function_reference(&variant);
        let arguments = convert_args(args, ctx, depth)?;
        let output_type = ctx.convert_type(return_type)?;
        Ok(Some(Expression::ScalarFunction(ScalarFunction {
            function_reference,
            arguments,
            output_type: Some(output_type),
        })))
    }
}
