use std::sync::Arc;

use arrow_schema::DataType;
use ffq_common::PlanNodeIdGenerator;
use ffq_planner::{Expr, FilterNode, PlanNode, RangeBound};
use ffq_substrait::proto::{ColumnRange, RangeLimit, ReadType, Rel};
use ffq_substrait::{Catalog, PlanConverter};

mod support;

use support::{col, fixture, init_tracing, lit_i32, root_rel, scan};

fn add_only_converter() -> PlanConverter {
    init_tracing();
    let catalog = Catalog::load_json_files(&[fixture("add_only.json")]).expect("catalog");
    PlanConverter::new(Arc::new(catalog))
}

#[test]
fn filter_over_scan_becomes_ranged_read_without_extensions() {
    let converter = add_only_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let input = scan(&mut ids, "t", &[("x", DataType::Int32)]);
    let predicate = Expr::call("gte", vec![col(&input, 0), lit_i32(5)], DataType::Boolean);
    let filter = PlanNode::Filter(FilterNode::try_new(ids.next_id(), predicate, input).expect("filter"));

    let plan = converter.to_substrait(&filter).expect("outbound");
    let Rel::Read(read) = root_rel(&plan) else {
        panic!("expected a read, got {:?}", root_rel(&plan).kind());
    };
    assert!(read.filter.is_none());
    assert_eq!(
        read.column_ranges,
        vec![ColumnRange {
            field: 0,
            lower: Some(RangeLimit {
                value: 5.0,
                exclusive: false
            }),
            upper: None,
            null_allowed: true,
        }]
    );
    assert!(matches!(read.read_type, Some(ReadType::NamedTable(ref t)) if t.names == vec!["t"]));
    assert!(plan.extensions.is_empty());
    assert!(plan.extension_uris.is_empty());
}

#[test]
fn ranged_read_converts_back_to_scan_filters() {
    let converter = add_only_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let input = scan(&mut ids, "db.t", &[("x", DataType::Int32), ("y", DataType::Int64)]);
    let predicate = Expr::call(
        "and",
        vec![
            Expr::call("gte", vec![col(&input, 0), lit_i32(5)], DataType::Boolean),
            Expr::call("lt", vec![col(&input, 0), lit_i32(10)], DataType::Boolean),
            Expr::call("is_not_null", vec![col(&input, 0)], DataType::Boolean),
        ],
        DataType::Boolean,
    );
    let filter = PlanNode::Filter(FilterNode::try_new(ids.next_id(), predicate, input).expect("filter"));

    let plan = converter.to_substrait(&filter).expect("outbound");
    let back = converter.from_substrait(&plan).expect("inbound");
    let PlanNode::TableScan(scan) = &back.root else {
        panic!("expected a table scan, got {}", back.root.name());
    };
    assert_eq!(scan.table(), "db.t");
    let filters = scan.column_filters();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].column, 0);
    assert_eq!(
        filters[0].range.lower,
        Some(RangeBound {
            value: 5.0,
            exclusive: false
        })
    );
    assert_eq!(
        filters[0].range.upper,
        Some(RangeBound {
            value: 10.0,
            exclusive: true
        })
    );
    assert!(!filters[0].range.null_allowed);
    assert!(back.splits.is_empty());
}

#[test]
fn unfoldable_predicate_needs_catalog_entry() {
    let converter = add_only_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let input = scan(&mut ids, "t", &[("x", DataType::Int32)]);
    let predicate = Expr::call("neq", vec![col(&input, 0), lit_i32(5)], DataType::Boolean);
    let filter = PlanNode::Filter(FilterNode::try_new(ids.next_id(), predicate, input).expect("filter"));

    let err = converter.to_substrait(&filter).expect_err("neq is not in the catalog");
    assert!(matches!(err, ffq_common::FfqError::FunctionLookup(_)));
}
