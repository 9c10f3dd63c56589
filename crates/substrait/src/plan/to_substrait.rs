use arrow_schema::{DataType, Schema};
use ffq_common::{FfqError, Result};
use ffq_planner::{
    literal_at, AggregateCall, AggregateNode, ColumnFilter, Expr, HashJoinNode, PlanNode,
    TableScanNode, ValuesNode,
};
use tracing::debug;

use super::{phase_to_proto, sort_to_proto};
use crate::context::OutboundContext;
use crate::expr::to_proto_expr;
use crate::filter::{fold_native_predicate, to_proto_ranges, AND_FUNCTION};
use crate::function::FunctionKind;
use crate::join::{join_type_to_proto, EQ_FUNCTION};
use crate::literal::to_proto_literal;
use crate::proto::{
    AggregateFunction, AggregateRel, AggregationPhase, Emit, Expression, FetchRel, FieldReference, FilterRel,
    FunctionArgument, Grouping, JoinRel, Measure, NamedStruct, NamedTable, Plan, PlanRel,
    ProjectRel, ReadRel, ReadType, Rel, RelCommon, RelRoot, SortField, SortRel, StructLiteral,
    VirtualTable,
};
use crate::signature::Signature;
use crate::type_convert::to_type_expr;

/// Converts a native plan into a single-root interchange plan.
///
/// The extension header lists exactly the functions and types referenced
/// by the converted tree.
pub fn to_proto_plan(root: &PlanNode, mut ctx: OutboundContext<'_>) -> Result<Plan> {
    let rel = to_proto_rel(root, &mut ctx, 0)?;
    let names = root
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let (extension_uris, extensions) = ctx.collector.render();
    debug!(
        operator = "PlanConversion",
        direction = "outbound",
        root = root.name(),
        nodes = root.node_count(),
        extensions = extensions.len(),
        "converted native plan"
    );
    Ok(Plan {
        extension_uris,
        extensions,
        relations: vec![PlanRel::Root(RelRoot {
            input: Some(rel),
            names,
        })],
    })
}

fn to_proto_rel(node: &PlanNode, ctx: &mut OutboundContext<'_>, depth: usize) -> Result<Rel> {
    ctx.check_plan_depth(depth)?;
    match node {
        PlanNode::Values(v) => values_rel(v, &node.schema(), ctx),
        PlanNode::TableScan(scan) => scan_rel(scan, &node.schema(), scan.column_filters(), ctx),
        PlanNode::Filter(f) => {
            if let PlanNode::TableScan(scan) = f.input() {
                if let Some(filters) = fold_native_predicate(f.predicate(), scan.column_filters()) {
                    return scan_rel(scan, &f.input().schema(), &filters, ctx);
                }
            }
            let input = to_proto_rel(f.input(), ctx, depth + 1)?;
            let condition = to_proto_expr(f.predicate(), ctx, 0)?;
            Ok(Rel::Filter(Box::new(FilterRel {
                common: None,
                input: Some(input),
                condition: Some(condition),
            })))
        }
        PlanNode::Project(p) => {
            let input_len = p.input().schema().fields().len();
            let input = to_proto_rel(p.input(), ctx, depth + 1)?;
            let expressions = p
                .exprs()
                .iter()
                .map(|e| to_proto_expr(e, ctx, 0))
                .collect::<Result<Vec<_>>>()?;
            let output_mapping = (0..expressions.len())
                .map(|i| mapping_index(input_len + i))
                .collect::<Result<Vec<_>>>()?;
            Ok(Rel::Project(Box::new(ProjectRel {
                common: Some(RelCommon {
                    emit: Some(Emit { output_mapping }),
                }),
                input: Some(input),
                expressions,
            })))
        }
        PlanNode::Aggregate(a) => aggregate_rel(a, ctx, depth),
        PlanNode::OrderBy(o) => {
            let input = to_proto_rel(o.input(), ctx, depth + 1)?;
            let sorts = o
                .keys()
                .iter()
                .map(|&(column, order)| {
                    Ok(SortField {
                        expr: Some(field_ref(column)?),
                        direction: sort_to_proto(order),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Rel::Sort(Box::new(SortRel {
                common: None,
                input: Some(input),
                sorts,
            })))
        }
        PlanNode::Limit(l) => {
            let input = to_proto_rel(l.input(), ctx, depth + 1)?;
            let as_i64 = |v: u64, what: &str| {
                i64::try_from(v)
                    .map_err(|_| FfqError::Structural(format!("limit {what} {v} out of range")))
            };
            Ok(Rel::Fetch(Box::new(FetchRel {
                common: None,
                input: Some(input),
                offset: as_i64(l.offset(), "offset")?,
                count: as_i64(l.count(), "count")?,
            })))
        }
        PlanNode::HashJoin(j) => join_rel(j, ctx, depth),
    }
}

fn field_ref(index: usize) -> Result<Expression> {
    let field = u32::try_from(index).map_err(|_| {
        FfqError::Structural(format!("column index {index} does not fit a field reference"))
    })?;
    Ok(Expression::Selection(FieldReference { field }))
}

fn mapping_index(index: usize) -> Result<i32> {
    i32::try_from(index)
        .map_err(|_| FfqError::Structural(format!("output index {index} does not fit an emit mapping")))
}

fn named_struct(schema: &Schema, ctx: &mut OutboundContext<'_>) -> Result<NamedStruct> {
    let mut names = Vec::with_capacity(schema.fields().len());
    let mut types = Vec::with_capacity(schema.fields().len());
    for f in schema.fields() {
        names.push(f.name().clone());
        types.push(ctx.convert_type(f.data_type())?);
    }
    Ok(NamedStruct { names, types })
}

/// One struct literal per batch, column-major.
fn values_rel(v: &ValuesNode, schema: &Schema, ctx: &mut OutboundContext<'_>) -> Result<Rel> {
    let base_schema = named_struct(schema, ctx)?;
    let mut values = Vec::with_capacity(v.batches().len());
    for batch in v.batches() {
        let mut fields = Vec::with_capacity(batch.num_columns() * batch.num_rows());
        for column in batch.columns() {
            for row in 0..batch.num_rows() {
                fields.push(to_proto_literal(&literal_at(column.as_ref(), row)?, ctx)?);
            }
        }
        values.push(StructLiteral { fields });
    }
    Ok(Rel::Read(Box::new(ReadRel {
        common: None,
        base_schema: Some(base_schema),
        filter: None,
        column_ranges: vec![],
        read_type: Some(ReadType::VirtualTable(VirtualTable { values })),
    })))
}

fn scan_rel(
    scan: &TableScanNode,
    schema: &Schema,
    filters: &[ColumnFilter],
    ctx: &mut OutboundContext<'_>,
) -> Result<Rel> {
    Ok(Rel::Read(Box::new(ReadRel {
        common: None,
        base_schema: Some(named_struct(schema, ctx)?),
        filter: None,
        column_ranges: to_proto_ranges(filters)?,
        read_type: Some(ReadType::NamedTable(NamedTable {
            names: scan.table().split('.').map(str::to_string).collect(),
        })),
    })))
}

fn aggregate_rel(a: &AggregateNode, ctx: &mut OutboundContext<'_>, depth: usize) -> Result<Rel> {
    let input = to_proto_rel(a.input(), ctx, depth + 1)?;
    let groupings = if a.group_keys().is_empty() {
        vec![]
    } else {
        vec![Grouping {
            grouping_expressions: a
                .group_keys()
                .iter()
                .map(|&k| field_ref(k))
                .collect::<Result<Vec<_>>>()?,
        }]
    };
    let phase = phase_to_proto(a.step());
    let measures = a
        .aggregates()
        .iter()
        .map(|call| {
            Ok(Measure {
                measure: Some(aggregate_function(call, phase, ctx)?),
                filter: call
                    .mask
                    .as_ref()
                    .map(|m| to_proto_expr(m, ctx, 0))
                    .transpose()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Rel::Aggregate(Box::new(AggregateRel {
        common: None,
        input: Some(input),
        groupings,
        measures,
    })))
}

fn aggregate_function(
    call: &AggregateCall,
    phase: AggregationPhase,
    ctx: &mut OutboundContext<'_>,
) -> Result<AggregateFunction> {
    if call.args.iter().any(|a| matches!(a, Expr::Call { .. })) {
        return Err(FfqError::Unsupported(format!(
            "aggregate {} over computed arguments",
            call.name
        )));
    }
    let arg_types = call
        .args
        .iter()
        .map(|a| to_type_expr(&a.data_type()))
        .collect::<Result<Vec<_>>>()?;
    let signature = Signature::new(call.name.clone(), arg_types)
        .with_return_type(to_type_expr(&call.return_type)?);
    let variant = ctx
        .resolver(FunctionKind::Aggregate)
        .lookup(&signature)
        .ok_or_else(|| {
            FfqError::FunctionLookup(format!("no catalog entry for aggregate {signature}"))
        })?;
    let function_reference = ctx.collector().function_reference(&variant);
    let arguments = call
        .args
        .iter()
        .map(|a| Ok(FunctionArgument::Value(to_proto_expr(a, ctx, 0)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(AggregateFunction {
        function_reference,
        arguments,
        output_type: Some(ctx.convert_type(&call.return_type)?),
        phase,
    })
}

/// Inner equi join: keys become an `and` of `eq` over `left ++ right`, the
/// residual becomes the post-join filter.
fn join_rel(j: &HashJoinNode, ctx: &mut OutboundContext<'_>, depth: usize) -> Result<Rel> {
    let join_type = join_type_to_proto(j.join_type())?;
    let left_schema = j.left().schema();
    let right_schema = j.right().schema();
    let left = to_proto_rel(j.left(), ctx, depth + 1)?;
    let right = to_proto_rel(j.right(), ctx, depth + 1)?;

    let left_len = left_schema.fields().len();
    let mut equalities = j
        .left_keys()
        .iter()
        .zip(j.right_keys())
        .map(|(&l, &r)| {
            Expr::call(
                EQ_FUNCTION,
                vec![
                    Expr::Column {
                        index: l,
                        data_type: left_schema.field(l).data_type().clone(),
                    },
                    Expr::Column {
                        index: left_len + r,
                        data_type: right_schema.field(r).data_type().clone(),
                    },
                ],
                DataType::Boolean,
            )
        })
        .collect::<Vec<_>>();
    let condition = if equalities.len() == 1 {
        equalities.remove(0)
    } else {
        Expr::call(AND_FUNCTION, equalities, DataType::Boolean)
    };

    Ok(Rel::Join(Box::new(JoinRel {
        common: None,
        left: Some(left),
        right: Some(right),
        expression: Some(to_proto_expr(&condition, ctx, 0)?),
        post_join_filter: j.filter().map(|f| to_proto_expr(f, ctx, 0)).transpose()?,
        r#type: join_type,
    })))
}
