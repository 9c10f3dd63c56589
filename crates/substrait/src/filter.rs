//! Folding of conjunctive comparison predicates into per-column ranges.
//!
//! A conjunction is split on `and` into leaves. Each leaf compares one
//! numeric column with one numeric literal (`gte`, `gt`, `lte`, `lt`) or tests it
//! with `is_not_null`, and is folded into that column's accumulator. Later
//! leaves replace earlier bounds on the same side.

use std::collections::BTreeMap;

use arrow_schema::DataType;
use ffq_common::{FfqError, Result};
use ffq_planner::{ColumnFilter, DoubleRange, Expr, RangeBound};

use crate::context::InboundContext;
use crate::literal::from_proto_literal;
use crate::proto::{ColumnRange, Expression, FunctionArgument, RangeLimit, ScalarFunction};

pub const AND_FUNCTION: &str = "and";

/// Comparison leaves that fold into a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    IsNotNull,
    Gte,
    Gt,
    Lte,
    Lt,
}

impl RangeOp {
    pub fn from_name(name: &str) -> Option<RangeOp> {
        let op = match name {
            "is_not_null" => RangeOp::IsNotNull,
            "gte" => RangeOp::Gte,
            "gt" => RangeOp::Gt,
            "lte" => RangeOp::Lte,
            "lt" => RangeOp::Lt,
            _ => return None,
        };
        Some(op)
    }

    /// Same comparison with operands swapped (`5 <= x` is `x >= 5`).
    fn flipped(self) -> RangeOp {
        match self {
            RangeOp::Gte => RangeOp::Lte,
            RangeOp::Gt => RangeOp::Lt,
            RangeOp::Lte => RangeOp::Gte,
            RangeOp::Lt => RangeOp::Gt,
            RangeOp::IsNotNull => RangeOp::IsNotNull,
        }
    }
}

/// Range state of one column while leaves are folded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAccumulator {
    pub lower: Option<f64>,
    pub lower_exclusive: bool,
    pub upper: Option<f64>,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl Default for RangeAccumulator {
    fn default() -> Self {
        Self {
            lower: None,
            lower_exclusive: false,
            upper: None,
            upper_exclusive: false,
            null_allowed: true,
        }
    }
}

impl RangeAccumulator {
    /// Folds one leaf; `value` is ignored for [`RangeOp::IsNotNull`].
    pub fn apply(&mut self, op: RangeOp, value: f64) {
        match op {
            RangeOp::IsNotNull => self.null_allowed = false,
            RangeOp::Gte | RangeOp::Gt => {
                self.lower = Some(value);
                self.lower_exclusive = op == RangeOp::Gt;
            }
            RangeOp::Lte | RangeOp::Lt => {
                self.upper = Some(value);
                self.upper_exclusive = op == RangeOp::Lt;
            }
        }
    }

    pub fn seed(range: &DoubleRange) -> Self {
        Self {
            lower: range.lower.map(|b| b.value),
            lower_exclusive: range.lower.is_some_and(|b| b.exclusive),
            upper: range.upper.map(|b| b.value),
            upper_exclusive: range.upper.is_some_and(|b| b.exclusive),
            null_allowed: range.null_allowed,
        }
    }

    pub fn to_range(&self) -> DoubleRange {
        DoubleRange {
            lower: self.lower.map(|value| RangeBound {
                value,
                exclusive: self.lower_exclusive,
            }),
            upper: self.upper.map(|value| RangeBound {
                value,
                exclusive: self.upper_exclusive,
            }),
            null_allowed: self.null_allowed,
        }
    }
}

/// Accumulators keyed by column position.
#[derive(Debug, Default, Clone)]
pub struct ColumnRanges {
    columns: BTreeMap<usize, RangeAccumulator>,
}

impl ColumnRanges {
    pub fn from_filters(filters: &[ColumnFilter]) -> Self {
        let mut ranges = Self::default();
        for f in filters {
            ranges
                .columns
                .insert(f.column, RangeAccumulator::seed(&f.range));
        }
        ranges
    }

    pub fn fold(&mut self, column: usize, op: RangeOp, value: f64) {
        self.columns.entry(column).or_default().apply(op, value);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Filters in column order.
    pub fn into_filters(self) -> Vec<ColumnFilter> {
        self.columns
            .into_iter()
            .map(|(column, acc)| ColumnFilter {
                column,
                range: acc.to_range(),
            })
            .collect()
    }
}

/// Splits a native predicate on `and` calls.
pub fn flatten_conjunction<'e>(predicate: &'e Expr, out: &mut Vec<&'e Expr>) {
    match predicate {
        Expr::Call { name, args, .. } if name == AND_FUNCTION => {
            for a in args {
                flatten_conjunction(a, out);
            }
        }
        other => out.push(other),
    }
}

/// Folds a native predicate completely into column ranges.
///
/// Returns `None` when any leaf cannot be expressed as a range; the caller
/// then keeps the predicate as a generic filter.
pub fn fold_native_predicate(predicate: &Expr, seed: &[ColumnFilter]) -> Option<Vec<ColumnFilter>> {
    let mut leaves = Vec::new();
    flatten_conjunction(predicate, &mut leaves);

    let mut ranges = ColumnRanges::from_filters(seed);
    for leaf in leaves {
        let Expr::Call { name, args, .. } = leaf else {
            return None;
        };
        let op = RangeOp::from_name(name)?;
        match (op, args.as_slice()) {
            (RangeOp::IsNotNull, [col]) => ranges.fold(col.as_column()?, op, 0.0),
            (_, [Expr::Column { index, data_type }, Expr::Literal(v)])
                if is_numeric(data_type) =>
            {
                ranges.fold(*index, op, v.as_f64()?)
            }
            (_, [Expr::Literal(v), Expr::Column { index, data_type }])
                if is_numeric(data_type) =>
            {
                ranges.fold(*index, op.flipped(), v.as_f64()?)
            }
            _ => return None,
        }
    }
    Some(ranges.into_filters())
}

fn is_numeric(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
    )
}

/// Splits an interchange condition on `and` into scalar-function leaves.
pub fn flatten_proto_conjunction<'e>(
    condition: &'e Expression,
    ctx: &InboundContext<'_>,
    out: &mut Vec<&'e ScalarFunction>,
) -> Result<()> {
    let Expression::ScalarFunction(f) = condition else {
        return Err(FfqError::Unsupported(
            "range filter leaves must be function calls".to_string(),
        ));
    };
    if ctx.interchange_name(f.function_reference)? == AND_FUNCTION {
        for arg in &f.arguments {
            if let FunctionArgument::Value(e) = arg {
                flatten_proto_conjunction(e, ctx, out)?;
            }
        }
    } else {
        out.push(f);
    }
    Ok(())
}

/// Folds an interchange read filter into `ranges`; every leaf must be a
/// supported single-column comparison.
pub fn fold_proto_condition(
    condition: &Expression,
    field_count: usize,
    ctx: &InboundContext<'_>,
    ranges: &mut ColumnRanges,
) -> Result<()> {
    let mut leaves = Vec::new();
    flatten_proto_conjunction(condition, ctx, &mut leaves)?;

    for leaf in leaves {
        let name = ctx.interchange_name(leaf.function_reference)?;
        let op = RangeOp::from_name(name).ok_or_else(|| {
            FfqError::Unsupported(format!("range filter function '{name}'"))
        })?;
        let values = leaf
            .arguments
            .iter()
            .filter_map(|a| match a {
                FunctionArgument::Value(e) => Some(e),
                _ => None,
            })
            .collect::<Vec<_>>();

        let field = |idx: u32| -> Result<usize> {
            let idx = idx as usize;
            if idx >= field_count {
                return Err(FfqError::Structural(format!(
                    "range filter field {idx} out of range for {field_count} columns"
                )));
            }
            Ok(idx)
        };
        let numeric = |e: &Expression| -> Result<f64> {
            let Expression::Literal(lit) = e else {
                return Err(FfqError::Unsupported(
                    "range filter operand must be a literal".to_string(),
                ));
            };
            from_proto_literal(lit, ctx)?.as_f64().ok_or_else(|| {
                FfqError::Unsupported("range filter literal must be numeric".to_string())
            })
        };

        match (op, values.as_slice()) {
            (RangeOp::IsNotNull, [Expression::Selection(r)]) => {
                ranges.fold(field(r.field)?, op, 0.0)
            }
            (RangeOp::IsNotNull, _) => {
                return Err(FfqError::Structural(
                    "is_not_null filter expects one field argument".to_string(),
                ))
            }
            (_, [Expression::Selection(r), lit]) => ranges.fold(field(r.field)?, op, numeric(lit)?),
            (_, [lit, Expression::Selection(r)]) => {
                ranges.fold(field(r.field)?, op.flipped(), numeric(lit)?)
            }
            _ => {
                return Err(FfqError::Unsupported(format!(
                    "range filter '{name}' needs one field and one literal"
                )))
            }
        }
    }
    Ok(())
}

pub fn to_proto_ranges(filters: &[ColumnFilter]) -> Result<Vec<ColumnRange>> {
    filters
        .iter()
        .map(|f| {
            let field = u32::try_from(f.column).map_err(|_| {
                FfqError::Structural(format!("range column {} out of range", f.column))
            })?;
            let limit = |b: RangeBound| RangeLimit {
                value: b.value,
                exclusive: b.exclusive,
            };
            Ok(ColumnRange {
                field,
                lower: f.range.lower.map(limit),
                upper: f.range.upper.map(limit),
                null_allowed: f.range.null_allowed,
            })
        })
        .collect()
}

pub fn from_proto_ranges(ranges: &[ColumnRange], field_count: usize) -> Result<Vec<ColumnFilter>> {
    ranges
        .iter()
        .map(|r| {
            let column = r.field as usize;
            if column >= field_count {
                return Err(FfqError::Structural(format!(
                    "column range field {column} out of range for {field_count} columns"
                )));
            }
            let bound = |l: RangeLimit| RangeBound {
                value: l.value,
                exclusive: l.exclusive,
            };
            Ok(ColumnFilter {
                column,
                range: DoubleRange {
                    lower: r.lower.map(bound),
                    upper: r.upper.map(bound),
                    null_allowed: r.null_allowed,
                },
            })
        })
        .collect()
}
