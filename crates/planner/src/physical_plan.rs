use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use ffq_common::{FfqError, PlanNodeId, Result};
use serde::{Deserialize, Serialize};

use crate::expr::{AggregateCall, Expr};

/// The native operator tree.
///
/// Every node owns its inputs exclusively and computes its output schema once,
/// inside its `try_new` constructor. Nodes are immutable after construction.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// In-memory literal rows.
    Values(ValuesNode),
    /// Connector-backed table scan with pushed-down column ranges.
    TableScan(TableScanNode),
    /// Row filter.
    Filter(FilterNode),
    /// Projection.
    Project(ProjectNode),
    /// Hash aggregation (one step of a possibly multi-step aggregation).
    Aggregate(AggregateNode),
    /// Full sort.
    OrderBy(OrderByNode),
    /// Offset/count limit.
    Limit(LimitNode),
    /// Equi hash join with optional residual filter.
    HashJoin(HashJoinNode),
}

impl PlanNode {
    /// Returns direct child operators, left before right.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Values(_) | PlanNode::TableScan(_) => vec![],
            PlanNode::Filter(x) => vec![x.input.as_ref()],
            PlanNode::Project(x) => vec![x.input.as_ref()],
            PlanNode::Aggregate(x) => vec![x.input.as_ref()],
            PlanNode::OrderBy(x) => vec![x.input.as_ref()],
            PlanNode::Limit(x) => vec![x.input.as_ref()],
            PlanNode::HashJoin(x) => vec![x.left.as_ref(), x.right.as_ref()],
        }
    }

    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::Values(x) => x.id,
            PlanNode::TableScan(x) => x.id,
            PlanNode::Filter(x) => x.id,
            PlanNode::Project(x) => x.id,
            PlanNode::Aggregate(x) => x.id,
            PlanNode::OrderBy(x) => x.id,
            PlanNode::Limit(x) => x.id,
            PlanNode::HashJoin(x) => x.id,
        }
    }

    /// Output schema computed at construction.
    pub fn schema(&self) -> SchemaRef {
        match self {
            PlanNode::Values(x) => x.schema.clone(),
            PlanNode::TableScan(x) => x.schema.clone(),
            PlanNode::Filter(x) => x.input.schema(),
            PlanNode::Project(x) => x.schema.clone(),
            PlanNode::Aggregate(x) => x.schema.clone(),
            PlanNode::OrderBy(x) => x.input.schema(),
            PlanNode::Limit(x) => x.input.schema(),
            PlanNode::HashJoin(x) => x.schema.clone(),
        }
    }

    /// Short operator name used in explain output and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PlanNode::Values(_) => "Values",
            PlanNode::TableScan(_) => "TableScan",
            PlanNode::Filter(_) => "Filter",
            PlanNode::Project(_) => "Project",
            PlanNode::Aggregate(_) => "Aggregate",
            PlanNode::OrderBy(_) => "OrderBy",
            PlanNode::Limit(_) => "Limit",
            PlanNode::HashJoin(_) => "HashJoin",
        }
    }

    /// Number of nodes in this tree.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }
}

fn check_column(schema: &Schema, index: usize, what: &str) -> Result<()> {
    if index >= schema.fields().len() {
        return Err(FfqError::Structural(format!(
            "{what} column {index} out of range for schema of {} fields",
            schema.fields().len()
        )));
    }
    Ok(())
}

/// Literal rows held in memory.
#[derive(Debug, Clone)]
pub struct ValuesNode {
    id: PlanNodeId,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ValuesNode {
    /// Every batch must carry exactly the column types of `schema`.
    pub fn try_new(id: PlanNodeId, schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for b in &batches {
            let batch_schema = b.schema();
            let types = batch_schema.fields().iter().map(|f| f.data_type().clone());
            let expected = schema.fields().iter().map(|f| f.data_type().clone());
            if b.num_columns() != schema.fields().len() || !types.eq(expected) {
                return Err(FfqError::Structural(
                    "values batch does not match declared schema".to_string(),
                ));
            }
        }
        Ok(Self {
            id,
            schema,
            batches,
        })
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Closed-or-open bound of a [`DoubleRange`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: f64,
    pub exclusive: bool,
}

/// Interval predicate on one numeric column, evaluated as a double.
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleRange {
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
    pub null_allowed: bool,
}

impl DoubleRange {
    /// Whether a non-null `v` satisfies both bounds.
    pub fn contains(&self, v: f64) -> bool {
        let above = match self.lower {
            Some(b) if b.exclusive => v > b.value,
            Some(b) => v >= b.value,
            None => true,
        };
        let below = match self.upper {
            Some(b) if b.exclusive => v < b.value,
            Some(b) => v <= b.value,
            None => true,
        };
        above && below
    }
}

/// Range filter pushed into a scan, addressed by column position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: usize,
    pub range: DoubleRange,
}

/// Scan of a connector table.
///
/// Split metadata lives outside the plan, keyed by this node's id.
#[derive(Debug, Clone)]
pub struct TableScanNode {
    id: PlanNodeId,
    table: String,
    schema: SchemaRef,
    column_filters: Vec<ColumnFilter>,
}

impl TableScanNode {
    pub fn try_new(
        id: PlanNodeId,
        table: impl Into<String>,
        schema: SchemaRef,
        column_filters: Vec<ColumnFilter>,
    ) -> Result<Self> {
        for f in &column_filters {
            check_column(&schema, f.column, "range filter")?;
        }
        Ok(Self {
            id,
            table: table.into(),
            schema,
            column_filters,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column_filters(&self) -> &[ColumnFilter] {
        &self.column_filters
    }
}

/// Row filter.
#[derive(Debug, Clone)]
pub struct FilterNode {
    id: PlanNodeId,
    predicate: Expr,
    input: Box<PlanNode>,
}

impl FilterNode {
    /// The predicate must be boolean and reference only input columns.
    pub fn try_new(id: PlanNodeId, predicate: Expr, input: PlanNode) -> Result<Self> {
        predicate.validate(&input.schema())?;
        if predicate.data_type() != DataType::Boolean {
            return Err(FfqError::Structural(format!(
                "filter predicate must be boolean, got {}",
                predicate.data_type()
            )));
        }
        Ok(Self {
            id,
            predicate,
            input: Box::new(input),
        })
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }

    pub fn input(&self) -> &PlanNode {
        &self.input
    }
}

/// Projection computing one output column per expression.
#[derive(Debug, Clone)]
pub struct ProjectNode {
    id: PlanNodeId,
    exprs: Vec<Expr>,
    input: Box<PlanNode>,
    schema: SchemaRef,
}

impl ProjectNode {
    pub fn try_new(
        id: PlanNodeId,
        names: Vec<String>,
        exprs: Vec<Expr>,
        input: PlanNode,
    ) -> Result<Self> {
        if names.len() != exprs.len() {
            return Err(FfqError::Structural(format!(
                "projection has {} names for {} expressions",
                names.len(),
                exprs.len()
            )));
        }
        let input_schema = input.schema();
        for e in &exprs {
            e.validate(&input_schema)?;
        }
        let fields = names
            .into_iter()
            .zip(&exprs)
            .map(|(n, e)| Field::new(n, e.data_type(), true))
            .collect::<Vec<_>>();
        Ok(Self {
            id,
            exprs,
            input: Box::new(input),
            schema: Arc::new(Schema::new(fields)),
        })
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    pub fn names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    pub fn input(&self) -> &PlanNode {
        &self.input
    }
}

/// Which stage of a possibly multi-stage aggregation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationStep {
    /// Raw input to intermediate state.
    Partial,
    /// Intermediate state to intermediate state.
    Intermediate,
    /// Raw input to final result.
    Single,
    /// Intermediate state to final result.
    Final,
}

/// Grouped aggregation.
#[derive(Debug, Clone)]
pub struct AggregateNode {
    id: PlanNodeId,
    step: AggregationStep,
    group_keys: Vec<usize>,
    aggregates: Vec<AggregateCall>,
    input: Box<PlanNode>,
    schema: SchemaRef,
}

impl AggregateNode {
    /// Output is the grouping columns (keeping input names) followed by one
    /// column per aggregate named by `aggregate_names`.
    pub fn try_new(
        id: PlanNodeId,
        step: AggregationStep,
        group_keys: Vec<usize>,
        aggregate_names: Vec<String>,
        aggregates: Vec<AggregateCall>,
        input: PlanNode,
    ) -> Result<Self> {
        if aggregate_names.len() != aggregates.len() {
            return Err(FfqError::Structural(format!(
                "aggregation has {} names for {} aggregates",
                aggregate_names.len(),
                aggregates.len()
            )));
        }
        let input_schema = input.schema();
        let mut fields = Vec::with_capacity(group_keys.len() + aggregates.len());
        for &k in &group_keys {
            check_column(&input_schema, k, "grouping")?;
            fields.push(input_schema.field(k).clone());
        }
        for (name, call) in aggregate_names.into_iter().zip(&aggregates) {
            call.validate(&input_schema)?;
            fields.push(Field::new(name, call.return_type.clone(), true));
        }
        Ok(Self {
            id,
            step,
            group_keys,
            aggregates,
            input: Box::new(input),
            schema: Arc::new(Schema::new(fields)),
        })
    }

    pub fn step(&self) -> AggregationStep {
        self.step
    }

    pub fn group_keys(&self) -> &[usize] {
        &self.group_keys
    }

    pub fn aggregates(&self) -> &[AggregateCall] {
        &self.aggregates
    }

    pub fn input(&self) -> &PlanNode {
        &self.input
    }
}

/// Direction and null placement of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl SortOrder {
    pub fn is_ascending(self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::AscNullsLast)
    }

    pub fn is_nulls_first(self) -> bool {
        matches!(self, SortOrder::AscNullsFirst | SortOrder::DescNullsFirst)
    }
}

/// Sort by input columns.
#[derive(Debug, Clone)]
pub struct OrderByNode {
    id: PlanNodeId,
    keys: Vec<(usize, SortOrder)>,
    input: Box<PlanNode>,
}

impl OrderByNode {
    pub fn try_new(id: PlanNodeId, keys: Vec<(usize, SortOrder)>, input: PlanNode) -> Result<Self> {
        if keys.is_empty() {
            return Err(FfqError::Structural("sort requires at least one key".to_string()));
        }
        let schema = input.schema();
        for (k, _) in &keys {
            check_column(&schema, *k, "sort key")?;
        }
        Ok(Self {
            id,
            keys,
            input: Box::new(input),
        })
    }

    pub fn keys(&self) -> &[(usize, SortOrder)] {
        &self.keys
    }

    pub fn input(&self) -> &PlanNode {
        &self.input
    }
}

/// Skip `offset` rows then emit at most `count` rows.
#[derive(Debug, Clone)]
pub struct LimitNode {
    id: PlanNodeId,
    offset: u64,
    count: u64,
    input: Box<PlanNode>,
}

impl LimitNode {
    pub fn new(id: PlanNodeId, offset: u64, count: u64, input: PlanNode) -> Self {
        Self {
            id,
            offset,
            count,
            input: Box::new(input),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn input(&self) -> &PlanNode {
        &self.input
    }
}

/// Native join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    /// Left rows with at least one match; output is the left schema.
    LeftSemi,
    /// Right rows with at least one match; output is the right schema.
    RightSemi,
    /// Left rows with no match, null-aware; output is the left schema.
    Anti,
}

/// Equi hash join.
///
/// Left keys index the left schema and right keys the right schema. The
/// residual filter is evaluated over the concatenation of both inputs.
#[derive(Debug, Clone)]
pub struct HashJoinNode {
    id: PlanNodeId,
    join_type: JoinType,
    left_keys: Vec<usize>,
    right_keys: Vec<usize>,
    filter: Option<Expr>,
    left: Box<PlanNode>,
    right: Box<PlanNode>,
    schema: SchemaRef,
}

impl HashJoinNode {
    pub fn try_new(
        id: PlanNodeId,
        join_type: JoinType,
        left_keys: Vec<usize>,
        right_keys: Vec<usize>,
        filter: Option<Expr>,
        left: PlanNode,
        right: PlanNode,
    ) -> Result<Self> {
        if left_keys.is_empty() || left_keys.len() != right_keys.len() {
            return Err(FfqError::Structural(format!(
                "hash join needs matching non-empty key lists, got {} left and {} right",
                left_keys.len(),
                right_keys.len()
            )));
        }
        let left_schema = left.schema();
        let right_schema = right.schema();
        for &k in &left_keys {
            check_column(&left_schema, k, "left join key")?;
        }
        for &k in &right_keys {
            check_column(&right_schema, k, "right join key")?;
        }
        let combined = Schema::new(
            left_schema
                .fields()
                .iter()
                .chain(right_schema.fields().iter())
                .cloned()
                .collect::<Vec<_>>(),
        );
        if let Some(f) = &filter {
            f.validate(&combined)?;
            if f.data_type() != DataType::Boolean {
                return Err(FfqError::Structural(
                    "join filter must be boolean".to_string(),
                ));
            }
        }
        let schema = match join_type {
            JoinType::LeftSemi | JoinType::Anti => left_schema,
            JoinType::RightSemi => right_schema,
            _ => Arc::new(combined),
        };
        Ok(Self {
            id,
            join_type,
            left_keys,
            right_keys,
            filter,
            left: Box::new(left),
            right: Box::new(right),
            schema,
        })
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn left_keys(&self) -> &[usize] {
        &self.left_keys
    }

    pub fn right_keys(&self) -> &[usize] {
        &self.right_keys
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    pub fn left(&self) -> &PlanNode {
        &self.left
    }

    pub fn right(&self) -> &PlanNode {
        &self.right
    }
}
