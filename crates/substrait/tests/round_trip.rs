use std::sync::Arc;

use arrow::array::{Array, ArrayRef, NullArray};
use arrow::record_batch::RecordBatch;
use arrow_schema::DataType;
use ffq_common::PlanNodeIdGenerator;
use ffq_planner::{
    explain_plan, AggregateCall, AggregateNode, AggregationStep, Expr, FilterNode, HashJoinNode,
    JoinType, LimitNode, LiteralValue, OrderByNode, PlanNode, ProjectNode, SortOrder, ValuesNode,
};
use ffq_substrait::proto::{AggregationPhase, Rel, SimpleExtensionDeclaration};

mod support;

use support::{builtin_converter, col, field_types, lit_i32, root_rel, sample_values, schema};

fn find<'p>(node: &'p PlanNode, name: &str) -> Option<&'p PlanNode> {
    if node.name() == name {
        return Some(node);
    }
    node.children().into_iter().find_map(|c| find(c, name))
}

fn pipeline(ids: &mut PlanNodeIdGenerator) -> PlanNode {
    let values = sample_values(ids);
    let predicate = Expr::call("gt", vec![col(&values, 0), lit_i32(1)], DataType::Boolean);
    let filter = PlanNode::Filter(FilterNode::try_new(ids.next_id(), predicate, values).expect("filter"));

    let doubled = Expr::call("plus", vec![col(&filter, 0), col(&filter, 0)], DataType::Int32);
    let project = PlanNode::Project(
        ProjectNode::try_new(
            ids.next_id(),
            vec!["a2".to_string(), "b".to_string()],
            vec![doubled, col(&filter, 1)],
            filter,
        )
        .expect("project"),
    );

    let total = AggregateCall::new("sum", vec![col(&project, 1)], DataType::Int64);
    let aggregate = PlanNode::Aggregate(
        AggregateNode::try_new(
            ids.next_id(),
            AggregationStep::Single,
            vec![0],
            vec!["total".to_string()],
            vec![total],
            project,
        )
        .expect("aggregate"),
    );
    let sort = PlanNode::OrderBy(
        OrderByNode::try_new(ids.next_id(), vec![(1, SortOrder::DescNullsLast)], aggregate)
            .expect("sort"),
    );
    PlanNode::Limit(LimitNode::new(ids.next_id(), 1, 10, sort))
}

#[test]
fn single_input_pipeline_round_trips() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let plan = pipeline(&mut ids);

    let proto = converter.to_substrait(&plan).expect("outbound");
    assert_eq!(root_rel(&proto).kind(), "fetch");
    let declared = proto
        .extensions
        .iter()
        .filter_map(|d| match d {
            SimpleExtensionDeclaration::ExtensionFunction(f) => Some(f.name.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(declared.len(), 3);
    assert!(declared.iter().any(|n| n.starts_with("gt:")));
    assert!(declared.iter().any(|n| n.starts_with("add:")));
    assert!(declared.iter().any(|n| n.starts_with("sum:")));

    let back = converter.from_substrait(&proto).expect("inbound");
    let names = {
        let mut names = vec![];
        let mut node = Some(&back.root);
        while let Some(n) = node {
            names.push(n.name());
            node = n.children().into_iter().next();
        }
        names
    };
    assert_eq!(
        names,
        vec!["Limit", "OrderBy", "Aggregate", "Project", "Filter", "Values"]
    );
    assert_eq!(field_types(&back.root), field_types(&plan));

    let PlanNode::Limit(limit) = &back.root else {
        panic!("expected limit");
    };
    assert_eq!((limit.offset(), limit.count()), (1, 10));

    let Some(PlanNode::Aggregate(agg)) = find(&back.root, "Aggregate") else {
        panic!("expected aggregate");
    };
    assert_eq!(agg.step(), AggregationStep::Single);
    assert_eq!(agg.group_keys(), &[0]);
    assert_eq!(agg.aggregates()[0].name, "sum");

    let Some(PlanNode::Project(project)) = find(&back.root, "Project") else {
        panic!("expected project");
    };
    assert!(matches!(&project.exprs()[0], Expr::Call { name, .. } if name == "plus"));

    let (Some(PlanNode::Values(got)), Some(PlanNode::Values(want))) =
        (find(&back.root, "Values"), find(&plan, "Values"))
    else {
        panic!("expected values on both sides");
    };
    assert_eq!(got.num_rows(), 3);
    assert_eq!(got.batches()[0].columns(), want.batches()[0].columns());
}

#[test]
fn inner_join_with_residual_round_trips() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let left = sample_values(&mut ids);
    let right = sample_values(&mut ids);
    let residual = Expr::call(
        "lt",
        vec![
            Expr::Column {
                index: 1,
                data_type: DataType::Int64,
            },
            Expr::Column {
                index: 3,
                data_type: DataType::Int64,
            },
        ],
        DataType::Boolean,
    );
    let join = PlanNode::HashJoin(
        HashJoinNode::try_new(
            ids.next_id(),
            JoinType::Inner,
            vec![0, 1],
            vec![0, 1],
            Some(residual),
            left,
            right,
        )
        .expect("join"),
    );

    let proto = converter.to_substrait(&join).expect("outbound");
    let Rel::Join(rel) = root_rel(&proto) else {
        panic!("expected join");
    };
    assert!(rel.post_join_filter.is_some());

    let back = converter.from_substrait(&proto).expect("inbound");
    let PlanNode::HashJoin(got) = &back.root else {
        panic!("expected hash join, got {}", explain_plan(&back.root));
    };
    assert_eq!(got.join_type(), JoinType::Inner);
    assert_eq!(got.left_keys(), &[0, 1]);
    assert_eq!(got.right_keys(), &[0, 1]);
    assert!(got.filter().is_some());
    assert_eq!(field_types(&back.root), field_types(&join));
}

#[test]
fn left_join_is_not_emitted() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let left = sample_values(&mut ids);
    let right = sample_values(&mut ids);
    let join = PlanNode::HashJoin(
        HashJoinNode::try_new(ids.next_id(), JoinType::Left, vec![0], vec![0], None, left, right)
            .expect("join"),
    );
    let err = converter.to_substrait(&join).expect_err("left join");
    assert!(matches!(err, ffq_common::FfqError::Unsupported(_)));
}

#[test]
fn null_literal_uses_unknown_type_extension() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let values = sample_values(&mut ids);
    let project = PlanNode::Project(
        ProjectNode::try_new(
            ids.next_id(),
            vec!["nothing".to_string()],
            vec![Expr::literal(LiteralValue::Null(DataType::Null))],
            values,
        )
        .expect("project"),
    );

    let proto = converter.to_substrait(&project).expect("outbound");
    assert!(proto.extensions.iter().any(|d| matches!(
        d,
        SimpleExtensionDeclaration::ExtensionType(t) if t.name == "unknown" && t.type_anchor == 1
    )));

    let back = converter.from_substrait(&proto).expect("inbound");
    assert_eq!(field_types(&back.root), vec![DataType::Null]);
}

#[test]
fn conditional_round_trips_as_if_call() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let values = sample_values(&mut ids);
    let cond = Expr::call("gt", vec![col(&values, 0), lit_i32(1)], DataType::Boolean);
    let branch = Expr::call("if", vec![cond, col(&values, 0), lit_i32(0)], DataType::Int32);
    let project = PlanNode::Project(
        ProjectNode::try_new(ids.next_id(), vec!["c".to_string()], vec![branch], values)
            .expect("project"),
    );

    let proto = converter.to_substrait(&project).expect("outbound");
    let back = converter.from_substrait(&proto).expect("inbound");
    let PlanNode::Project(p) = &back.root else {
        panic!("expected project");
    };
    assert!(matches!(&p.exprs()[0], Expr::Call { name, args, .. } if name == "if" && args.len() == 3));
    assert_eq!(field_types(&back.root), vec![DataType::Int32]);
}

#[test]
fn null_typed_literal_column_round_trips() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let schema = schema(&[("n", DataType::Null)]);
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(NullArray::new(2)) as ArrayRef])
        .expect("batch");
    let values = PlanNode::Values(ValuesNode::try_new(ids.next_id(), schema, vec![batch]).expect("values"));

    let proto = converter.to_substrait(&values).expect("outbound");
    assert!(proto.extensions.iter().any(|d| matches!(
        d,
        SimpleExtensionDeclaration::ExtensionType(t) if t.name == "unknown"
    )));

    let back = converter.from_substrait(&proto).expect("inbound");
    let PlanNode::Values(got) = &back.root else {
        panic!("expected values");
    };
    assert_eq!(got.num_rows(), 2);
    assert_eq!(got.batches()[0].column(0).data_type(), &DataType::Null);

    let again = converter.to_substrait(&back.root).expect("second outbound");
    assert_eq!(root_rel(&again), root_rel(&proto));
}

#[test]
fn masked_partial_aggregate_round_trips() {
    let converter = builtin_converter();
    let mut ids = PlanNodeIdGenerator::new();
    let values = sample_values(&mut ids);
    let mask = Expr::call("gt", vec![col(&values, 0), lit_i32(1)], DataType::Boolean);
    let total = AggregateCall::new("sum", vec![col(&values, 1)], DataType::Int64).with_mask(mask);
    let aggregate = PlanNode::Aggregate(
        AggregateNode::try_new(
            ids.next_id(),
            AggregationStep::Partial,
            vec![0],
            vec!["total".to_string()],
            vec![total],
            values,
        )
        .expect("aggregate"),
    );

    let proto = converter.to_substrait(&aggregate).expect("outbound");
    let Rel::Aggregate(rel) = root_rel(&proto) else {
        panic!("expected aggregate");
    };
    assert!(rel.measures[0].filter.is_some());
    assert_eq!(
        rel.measures[0].measure.as_ref().map(|m| m.phase),
        Some(AggregationPhase::InitialToIntermediate)
    );

    let back = converter.from_substrait(&proto).expect("inbound");
    let PlanNode::Aggregate(agg) = &back.root else {
        panic!("expected aggregate, got {}", explain_plan(&back.root));
    };
    assert_eq!(agg.step(), AggregationStep::Partial);
    let call = &agg.aggregates()[0];
    assert_eq!(call.return_type, DataType::Int64);
    let Some(Expr::Call { name, args, .. }) = &call.mask else {
        panic!("expected mask call");
    };
    assert_eq!(name, "gt");
    assert!(matches!(args[0], Expr::Column { index: 0, .. }));
}
