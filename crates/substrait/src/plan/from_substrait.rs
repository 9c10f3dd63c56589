use std::collections::HashMap;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_schema::{Field, Schema, SchemaRef};
use ffq_common::{FfqError, PlanNodeId, Result};
use ffq_planner::{
    literals_to_array, AggregateCall, AggregateNode, AggregationStep, Expr, FilterNode,
    HashJoinNode, LimitNode, OrderByNode, PlanNode, ProjectNode, TableScanNode, ValuesNode,
};
use tracing::debug;

use super::{phase_from_proto, sort_from_proto};
use crate::context::InboundContext;
use crate::expr::{from_proto_expr, value_arguments};
use crate::filter::{fold_proto_condition, from_proto_ranges, ColumnRanges};
use crate::function::FunctionKind;
use crate::join::{extract_join_keys, join_type_from_proto};
use crate::literal::from_proto_literal;
use crate::proto::{
    AggregateRel, Expression, FetchRel, JoinRel, LocalFiles, Plan, PlanRel, ProjectRel, ReadRel,
    ReadType, Rel, RelCommon, SortRel, StructLiteral,
};
use crate::split::{SplitFormat, SplitInfo};

/// Table name given to scans over local files.
pub const LOCAL_FILES_TABLE: &str = "local_files";

/// Result of an inbound conversion.
#[derive(Debug, Clone)]
pub struct ConvertedPlan {
    pub root: PlanNode,
    /// Split metadata of file-backed scans, keyed by scan node id.
    pub splits: HashMap<PlanNodeId, SplitInfo>,
}

/// Converts an interchange plan holding exactly one relation.
pub fn from_proto_plan(plan: &Plan, mut ctx: InboundContext<'_>) -> Result<ConvertedPlan> {
    let [relation] = plan.relations.as_slice() else {
        return Err(FfqError::Structural(format!(
            "expected exactly one relation, got {}",
            plan.relations.len()
        )));
    };
    let rel = match relation {
        PlanRel::Root(root) => required(root.input.as_ref(), "root", "input")?,
        PlanRel::Rel(rel) => rel,
    };
    let root = from_proto_rel(rel, &mut ctx, 0)?;
    debug!(
        operator = "PlanConversion",
        direction = "inbound",
        root = root.name(),
        nodes = root.node_count(),
        splits = ctx.splits.len(),
        "converted interchange plan"
    );
    Ok(ConvertedPlan {
        root,
        splits: ctx.splits,
    })
}

fn required<'r, T>(child: Option<&'r T>, kind: &str, what: &str) -> Result<&'r T> {
    child.ok_or_else(|| FfqError::Structural(format!("{kind} relation has no {what}")))
}

/// Only projections interpret emit mappings.
fn reject_emit(common: Option<&RelCommon>, kind: &str) -> Result<()> {
    if common.is_some_and(|c| c.emit.is_some()) {
        return Err(FfqError::Unsupported(format!("emit mapping on {kind} relation")));
    }
    Ok(())
}

fn from_proto_rel(rel: &Rel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    ctx.check_plan_depth(depth)?;
    match rel {
        Rel::Read(r) => read(r, ctx),
        Rel::Filter(f) => {
            reject_emit(f.common.as_ref(), "filter")?;
            let input = from_proto_rel(required(f.input.as_ref(), "filter", "input")?, ctx, depth + 1)?;
            let condition = required(f.condition.as_ref(), "filter", "condition")?;
            let predicate = from_proto_expr(condition, &input.schema(), ctx, 0)?;
            Ok(PlanNode::Filter(FilterNode::try_new(ctx.next_id(), predicate, input)?))
        }
        Rel::Project(p) => project(p, ctx, depth),
        Rel::Aggregate(a) => aggregate(a, ctx, depth),
        Rel::Sort(s) => sort(s, ctx, depth),
        Rel::Fetch(f) => fetch(f, ctx, depth),
        Rel::Join(j) => join(j, ctx, depth),
    }
}

fn read(r: &ReadRel, ctx: &mut InboundContext<'_>) -> Result<PlanNode> {
    reject_emit(r.common.as_ref(), "read")?;
    let base = required(r.base_schema.as_ref(), "read", "base schema")?;
    if base.names.len() != base.types.len() {
        return Err(FfqError::Structural(format!(
            "read schema has {} names for {} types",
            base.names.len(),
            base.types.len()
        )));
    }
    let fields = base
        .names
        .iter()
        .zip(&base.types)
        .map(|(name, t)| Ok(Field::new(name, ctx.convert_type(t)?, true)))
        .collect::<Result<Vec<_>>>()?;
    let schema: SchemaRef = Arc::new(Schema::new(fields));

    match required(r.read_type.as_ref(), "read", "read type")? {
        ReadType::VirtualTable(vt) => {
            if !r.column_ranges.is_empty() {
                return Err(FfqError::Unsupported(
                    "column ranges on literal data".to_string(),
                ));
            }
            let batches = vt
                .values
                .iter()
                .map(|row_set| literal_batch(row_set, &schema, ctx))
                .collect::<Result<Vec<_>>>()?;
            let values = PlanNode::Values(ValuesNode::try_new(ctx.next_id(), schema.clone(), batches)?);
            match &r.filter {
                Some(condition) => {
                    let predicate = from_proto_expr(condition, &schema, ctx, 0)?;
                    Ok(PlanNode::Filter(FilterNode::try_new(ctx.next_id(), predicate, values)?))
                }
                None => Ok(values),
            }
        }
        ReadType::LocalFiles(files) => {
            let split = split_info(files)?;
            let scan = table_scan(r, LOCAL_FILES_TABLE.to_string(), schema, ctx)?;
            ctx.splits.insert(scan.id(), split);
            Ok(scan)
        }
        ReadType::NamedTable(t) => {
            if t.names.is_empty() {
                return Err(FfqError::Structural("named table without a name".to_string()));
            }
            table_scan(r, t.names.join("."), schema, ctx)
        }
    }
}

/// Scan whose ranges combine the read's column ranges and its folded filter.
fn table_scan(
    r: &ReadRel,
    table: String,
    schema: SchemaRef,
    ctx: &mut InboundContext<'_>,
) -> Result<PlanNode> {
    let width = schema.fields().len();
    let mut ranges = ColumnRanges::from_filters(&from_proto_ranges(&r.column_ranges, width)?);
    if let Some(condition) = &r.filter {
        fold_proto_condition(condition, width, ctx, &mut ranges)?;
    }
    Ok(PlanNode::TableScan(TableScanNode::try_new(
        ctx.next_id(),
        table,
        schema,
        ranges.into_filters(),
    )?))
}

fn split_info(files: &LocalFiles) -> Result<SplitInfo> {
    let first = files
        .items
        .first()
        .ok_or_else(|| FfqError::Structural("local files read without files".to_string()))?;
    let mut split = SplitInfo {
        partition_index: first.partition_index,
        paths: Vec::with_capacity(files.items.len()),
        starts: Vec::with_capacity(files.items.len()),
        lengths: Vec::with_capacity(files.items.len()),
        format: SplitFormat::from(first.format),
    };
    for item in &files.items {
        if item.partition_index != split.partition_index {
            return Err(FfqError::Structural(format!(
                "local files span partitions {} and {}",
                split.partition_index, item.partition_index
            )));
        }
        split.paths.push(item.uri_file.clone());
        split.starts.push(item.start);
        split.lengths.push(item.length);
    }
    Ok(split)
}

/// Decodes one column-major struct literal into a batch.
fn literal_batch(
    row_set: &StructLiteral,
    schema: &SchemaRef,
    ctx: &InboundContext<'_>,
) -> Result<RecordBatch> {
    let columns = schema.fields().len();
    if columns == 0 {
        return Err(FfqError::Structural("literal data without columns".to_string()));
    }
    let total = row_set.fields.len();
    if total % columns != 0 {
        return Err(FfqError::Structural(format!(
            "{total} literal values do not divide into {columns} columns"
        )));
    }
    let rows = total / columns;
    let arrays = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(col, field)| {
            let values = row_set.fields[col * rows..(col + 1) * rows]
                .iter()
                .map(|lit| from_proto_literal(lit, ctx))
                .collect::<Result<Vec<_>>>()?;
            literals_to_array(field.data_type(), &values)
        })
        .collect::<Result<Vec<_>>>()?;
    RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| FfqError::Structural(format!("literal batch: {e}")))
}

fn project(p: &ProjectRel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    let input = from_proto_rel(required(p.input.as_ref(), "project", "input")?, ctx, depth + 1)?;
    let input_schema = input.schema();
    let computed = p
        .expressions
        .iter()
        .map(|e| from_proto_expr(e, &input_schema, ctx, 0))
        .collect::<Result<Vec<_>>>()?;

    let exprs = match p.common.as_ref().and_then(|c| c.emit.as_ref()) {
        None => computed,
        Some(emit) => {
            let input_len = input_schema.fields().len();
            emit.output_mapping
                .iter()
                .map(|&i| {
                    let i = usize::try_from(i).map_err(|_| {
                        FfqError::Structural(format!("negative emit index {i}"))
                    })?;
                    if i < input_len {
                        Expr::column(&input_schema, i)
                    } else {
                        computed.get(i - input_len).cloned().ok_or_else(|| {
                            FfqError::Structural(format!(
                                "emit index {i} out of range for {} outputs",
                                input_len + computed.len()
                            ))
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    let id = ctx.next_id();
    let names = (0..exprs.len()).map(|i| ctx.node_name(id, i)).collect();
    Ok(PlanNode::Project(ProjectNode::try_new(id, names, exprs, input)?))
}

fn aggregate(a: &AggregateRel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    reject_emit(a.common.as_ref(), "aggregate")?;
    let input = from_proto_rel(required(a.input.as_ref(), "aggregate", "input")?, ctx, depth + 1)?;
    let input_schema = input.schema();

    let group_keys = match a.groupings.as_slice() {
        [] => vec![],
        [grouping] => grouping
            .grouping_expressions
            .iter()
            .map(|e| match e {
                Expression::Selection(r) => {
                    let column = r.field as usize;
                    if column >= input_schema.fields().len() {
                        return Err(FfqError::Structural(format!(
                            "grouping field {column} out of range"
                        )));
                    }
                    Ok(column)
                }
                _ => Err(FfqError::Unsupported(
                    "grouping by a computed expression".to_string(),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        sets => {
            return Err(FfqError::Unsupported(format!(
                "{} grouping sets",
                sets.len()
            )))
        }
    };

    let functions = a
        .measures
        .iter()
        .map(|m| required(m.measure.as_ref(), "aggregate", "measure function"))
        .collect::<Result<Vec<_>>>()?;
    let step = match functions.first() {
        Some(f) => phase_from_proto(f.phase)?,
        None => AggregationStep::Single,
    };

    let mut aggregates = Vec::with_capacity(functions.len());
    for (f, measure) in functions.iter().zip(&a.measures) {
        let name = ctx.native_name(f.function_reference, FunctionKind::Aggregate)?;
        let args = value_arguments(&f.arguments, &input_schema, ctx, 0)?;
        let output = f.output_type.as_ref().ok_or_else(|| {
            FfqError::Structural(format!("aggregate '{name}' has no output type"))
        })?;
        let mut call = AggregateCall::new(name, args, ctx.convert_type(output)?);
        if let Some(mask) = &measure.filter {
            call = call.with_mask(from_proto_expr(mask, &input_schema, ctx, 0)?);
        }
        aggregates.push(call);
    }

    let id = ctx.next_id();
    let names = (0..aggregates.len())
        .map(|i| ctx.node_name(id, group_keys.len() + i))
        .collect();
    Ok(PlanNode::Aggregate(AggregateNode::try_new(
        id, step, group_keys, names, aggregates, input,
    )?))
}

fn sort(s: &SortRel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    reject_emit(s.common.as_ref(), "sort")?;
    let input = from_proto_rel(required(s.input.as_ref(), "sort", "input")?, ctx, depth + 1)?;
    let keys = s
        .sorts
        .iter()
        .map(|key| match required(key.expr.as_ref(), "sort", "key expression")? {
            Expression::Selection(r) => Ok((r.field as usize, sort_from_proto(key.direction)?)),
            _ => Err(FfqError::Unsupported(
                "sorting by a computed expression".to_string(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PlanNode::OrderBy(OrderByNode::try_new(ctx.next_id(), keys, input)?))
}

fn fetch(f: &FetchRel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    reject_emit(f.common.as_ref(), "fetch")?;
    let input = from_proto_rel(required(f.input.as_ref(), "fetch", "input")?, ctx, depth + 1)?;
    let non_negative = |v: i64, what: &str| {
        u64::try_from(v).map_err(|_| FfqError::Structural(format!("negative fetch {what} {v}")))
    };
    let offset = non_negative(f.offset, "offset")?;
    let count = non_negative(f.count, "count")?;
    Ok(PlanNode::Limit(LimitNode::new(ctx.next_id(), offset, count, input)))
}

fn join(j: &JoinRel, ctx: &mut InboundContext<'_>, depth: usize) -> Result<PlanNode> {
    reject_emit(j.common.as_ref(), "join")?;
    let join_type = join_type_from_proto(j.r#type)?;
    let left = from_proto_rel(required(j.left.as_ref(), "join", "left input")?, ctx, depth + 1)?;
    let right = from_proto_rel(required(j.right.as_ref(), "join", "right input")?, ctx, depth + 1)?;
    let left_schema = left.schema();
    let right_schema = right.schema();

    let condition = required(j.expression.as_ref(), "join", "expression")?;
    let keys = extract_join_keys(
        condition,
        left_schema.fields().len(),
        right_schema.fields().len(),
        ctx,
    )?;

    let combined = Schema::new(
        left_schema
            .fields()
            .iter()
            .chain(right_schema.fields().iter())
            .cloned()
            .collect::<Vec<_>>(),
    );
    let filter = j
        .post_join_filter
        .as_ref()
        .map(|e| from_proto_expr(e, &combined, ctx, 0))
        .transpose()?;

    Ok(PlanNode::HashJoin(HashJoinNode::try_new(
        ctx.next_id(),
        join_type,
        keys.left,
        keys.right,
        filter,
        left,
        right,
    )?))
}
