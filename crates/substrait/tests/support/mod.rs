#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Array, Int64Array};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use ffq_common::PlanNodeIdGenerator;
use ffq_planner::{Expr, LiteralValue, PlanNode, TableScanNode, ValuesNode};
use ffq_substrait::proto::{Plan, PlanRel, Rel};
use ffq_substrait::{Catalog, PlanConverter};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

pub fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

pub fn builtin_converter() -> PlanConverter {
    init_tracing();
    PlanConverter::new(Arc::new(Catalog::builtin().expect("builtin catalog")))
}

pub fn schema(fields: &[(&str, DataType)]) -> SchemaRef {
    Arc::new(Schema::new(
        fields
            .iter()
            .map(|(n, t)| Field::new(*n, t.clone(), true))
            .collect::<Vec<_>>(),
    ))
}

/// `a: i32, b: i64` with three rows, one null in `b`.
pub fn sample_values(ids: &mut PlanNodeIdGenerator) -> PlanNode {
    let schema = schema(&[("a", DataType::Int32), ("b", DataType::Int64)]);
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef,
            Arc::new(Int64Array::from(vec![Some(10), None, Some(30)])) as ArrayRef,
        ],
    )
    .expect("batch");
    PlanNode::Values(ValuesNode::try_new(ids.next_id(), schema, vec![batch]).expect("values"))
}

pub fn scan(ids: &mut PlanNodeIdGenerator, table: &str, fields: &[(&str, DataType)]) -> PlanNode {
    PlanNode::TableScan(
        TableScanNode::try_new(ids.next_id(), table, schema(fields), vec![]).expect("scan"),
    )
}

pub fn col(node: &PlanNode, index: usize) -> Expr {
    Expr::column(&node.schema(), index).expect("column")
}

pub fn lit_i32(v: i32) -> Expr {
    Expr::literal(LiteralValue::Int32(v))
}

pub fn root_rel(plan: &Plan) -> &Rel {
    match plan.relations.as_slice() {
        [PlanRel::Root(root)] => root.input.as_ref().expect("root input"),
        other => panic!("expected one root relation, got {other:?}"),
    }
}

pub fn field_types(node: &PlanNode) -> Vec<DataType> {
    node.schema()
        .fields()
        .iter()
        .map(|f| f.data_type().clone())
        .collect()
}
