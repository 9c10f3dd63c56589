use crate::expr::{AggregateCall, Expr};
use crate::literal::LiteralValue;
use crate::physical_plan::{DoubleRange, PlanNode};

/// Render a native plan as human-readable multiline text.
pub fn explain_plan(plan: &PlanNode) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &PlanNode, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    let schema = plan.schema();
    let id = plan.id();
    match plan {
        PlanNode::Values(v) => {
            out.push_str(&format!(
                "{pad}Values[{id}] rows={} columns={}\n",
                v.num_rows(),
                schema.fields().len()
            ));
        }
        PlanNode::TableScan(t) => {
            out.push_str(&format!("{pad}TableScan[{id}] table={}\n", t.table()));
            for f in t.column_filters() {
                out.push_str(&format!(
                    "{pad}  {} in {}\n",
                    schema.field(f.column).name(),
                    fmt_range(&f.range)
                ));
            }
        }
        PlanNode::Filter(f) => {
            out.push_str(&format!("{pad}Filter[{id}] {}\n", fmt_expr(f.predicate())));
            fmt_plan(f.input(), indent + 1, out);
        }
        PlanNode::Project(p) => {
            out.push_str(&format!("{pad}Project[{id}]\n"));
            for (field, e) in schema.fields().iter().zip(p.exprs()) {
                out.push_str(&format!("{pad}  {} := {}\n", field.name(), fmt_expr(e)));
            }
            fmt_plan(p.input(), indent + 1, out);
        }
        PlanNode::Aggregate(a) => {
            out.push_str(&format!("{pad}Aggregate[{id}] step={:?}\n", a.step()));
            out.push_str(&format!("{pad}  group_by={:?}\n", a.group_keys()));
            let first_agg = a.group_keys().len();
            for (i, call) in a.aggregates().iter().enumerate() {
                out.push_str(&format!(
                    "{pad}  {} := {}\n",
                    schema.field(first_agg + i).name(),
                    fmt_aggregate(call)
                ));
            }
            fmt_plan(a.input(), indent + 1, out);
        }
        PlanNode::OrderBy(o) => {
            let keys = o
                .keys()
                .iter()
                .map(|(k, ord)| format!("#{k} {ord:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("{pad}OrderBy[{id}] {keys}\n"));
            fmt_plan(o.input(), indent + 1, out);
        }
        PlanNode::Limit(l) => {
            out.push_str(&format!(
                "{pad}Limit[{id}] offset={} count={}\n",
                l.offset(),
                l.count()
            ));
            fmt_plan(l.input(), indent + 1, out);
        }
        PlanNode::HashJoin(j) => {
            out.push_str(&format!("{pad}HashJoin[{id}] type={:?}\n", j.join_type()));
            let on = j
                .left_keys()
                .iter()
                .zip(j.right_keys())
                .map(|(l, r)| format!("#{l} = #{r}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!("{pad}  on={on}\n"));
            if let Some(f) = j.filter() {
                out.push_str(&format!("{pad}  filter={}\n", fmt_expr(f)));
            }
            out.push_str(&format!("{pad}  left:\n"));
            fmt_plan(j.left(), indent + 2, out);
            out.push_str(&format!("{pad}  right:\n"));
            fmt_plan(j.right(), indent + 2, out);
        }
    }
}

fn fmt_range(r: &DoubleRange) -> String {
    let lower = match r.lower {
        Some(b) if b.exclusive => format!("({}", b.value),
        Some(b) => format!("[{}", b.value),
        None => "(-inf".to_string(),
    };
    let upper = match r.upper {
        Some(b) if b.exclusive => format!("{})", b.value),
        Some(b) => format!("{}]", b.value),
        None => "+inf)".to_string(),
    };
    let nulls = if r.null_allowed { " or null" } else { "" };
    format!("{lower}, {upper}{nulls}")
}

fn fmt_aggregate(call: &AggregateCall) -> String {
    let args = call.args.iter().map(fmt_expr).collect::<Vec<_>>().join(", ");
    match &call.mask {
        Some(m) => format!("{}({args}) mask={}", call.name, fmt_expr(m)),
        None => format!("{}({args})", call.name),
    }
}

fn fmt_expr(e: &Expr) -> String {
    match e {
        Expr::Column { index, .. } => format!("#{index}"),
        Expr::Literal(v) => fmt_literal(v),
        Expr::Call { name, args, .. } => format!(
            "{}({})",
            name,
            args.iter().map(fmt_expr).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn fmt_literal(v: &LiteralValue) -> String {
    match v {
        LiteralValue::Boolean(x) => x.to_string(),
        LiteralValue::Int8(x) => x.to_string(),
        LiteralValue::Int16(x) => x.to_string(),
        LiteralValue::Int32(x) => x.to_string(),
        LiteralValue::Int64(x) => x.to_string(),
        LiteralValue::Float32(x) => x.to_string(),
        LiteralValue::Float64(x) => x.to_string(),
        LiteralValue::Utf8(s) => format!("'{s}'"),
        LiteralValue::Null(_) => "null".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::{DataType, Field, Schema};
    use ffq_common::PlanNodeId;

    use super::*;
    use crate::physical_plan::{ColumnFilter, FilterNode, LimitNode, RangeBound, TableScanNode};

    #[test]
    fn renders_nested_plan_with_ranges() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int32, true)]));
        let scan = TableScanNode::try_new(
            PlanNodeId(0),
            "t",
            schema.clone(),
            vec![ColumnFilter {
                column: 0,
                range: DoubleRange {
                    lower: Some(RangeBound {
                        value: 5.0,
                        exclusive: false,
                    }),
                    upper: None,
                    null_allowed: false,
                },
            }],
        )
        .expect("scan");
        let pred = Expr::call(
            "neq",
            vec![
                Expr::column(&schema, 0).expect("col"),
                Expr::literal(LiteralValue::Int32(7)),
            ],
            DataType::Boolean,
        );
        let filter =
            FilterNode::try_new(PlanNodeId(1), pred, PlanNode::TableScan(scan)).expect("filter");
        let plan = PlanNode::Limit(LimitNode::new(
            PlanNodeId(2),
            0,
            10,
            PlanNode::Filter(filter),
        ));

        let expected = "Limit[2] offset=0 count=10\n  Filter[1] neq(#0, 7)\n    TableScan[0] table=t\n      x in [5, +inf)\n";
        assert_eq!(explain_plan(&plan), expected);
    }
}
