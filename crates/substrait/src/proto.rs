//! In-memory model of the interchange plan tree.
//!
//! Message kinds mirror the interchange schema one-to-one. Byte-level
//! encoding is handled elsewhere; these types derive serde so an external
//! layer can choose its wire format. Optional fields model the schema's
//! optional messages, so a missing required child is representable and is
//! reported as a structural error by the converters.

use serde::{Deserialize, Serialize};

/// Top-level interchange plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub extension_uris: Vec<SimpleExtensionUri>,
    #[serde(default)]
    pub extensions: Vec<SimpleExtensionDeclaration>,
    #[serde(default)]
    pub relations: Vec<PlanRel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleExtensionUri {
    pub extension_uri_anchor: u32,
    pub uri: String,
}

/// One `(anchor, uri, name)` declaration in the extension header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleExtensionDeclaration {
    ExtensionType(ExtensionTypeDecl),
    ExtensionFunction(ExtensionFunctionDecl),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionTypeDecl {
    pub extension_uri_reference: u32,
    pub type_anchor: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFunctionDecl {
    pub extension_uri_reference: u32,
    pub function_anchor: u32,
    /// Signature key of the referenced variant, e.g. `add:opt_i8_i8`.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanRel {
    /// Root relation with output column names.
    Root(RelRoot),
    /// Bare relation without names.
    Rel(Rel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRoot {
    pub input: Option<Rel>,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rel {
    Read(Box<ReadRel>),
    Filter(Box<FilterRel>),
    Project(Box<ProjectRel>),
    Aggregate(Box<AggregateRel>),
    Sort(Box<SortRel>),
    Fetch(Box<FetchRel>),
    Join(Box<JoinRel>),
}

impl Rel {
    pub fn kind(&self) -> &'static str {
        match self {
            Rel::Read(_) => "read",
            Rel::Filter(_) => "filter",
            Rel::Project(_) => "project",
            Rel::Aggregate(_) => "aggregate",
            Rel::Sort(_) => "sort",
            Rel::Fetch(_) => "fetch",
            Rel::Join(_) => "join",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelCommon {
    #[serde(default)]
    pub emit: Option<Emit>,
}

/// Explicit output remapping; indices address the relation's full output
/// (input columns followed by computed columns, for projections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emit {
    pub output_mapping: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStruct {
    pub names: Vec<String>,
    pub types: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub base_schema: Option<NamedStruct>,
    #[serde(default)]
    pub filter: Option<Expression>,
    /// Per-column numeric ranges already folded from a conjunction.
    #[serde(default)]
    pub column_ranges: Vec<ColumnRange>,
    pub read_type: Option<ReadType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub field: u32,
    #[serde(default)]
    pub lower: Option<RangeLimit>,
    #[serde(default)]
    pub upper: Option<RangeLimit>,
    pub null_allowed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeLimit {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadType {
    VirtualTable(VirtualTable),
    LocalFiles(LocalFiles),
    NamedTable(NamedTable),
}

/// Literal rows; each struct holds one batch, column-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTable {
    pub values: Vec<StructLiteral>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructLiteral {
    pub fields: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFiles {
    pub items: Vec<FileOrFiles>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOrFiles {
    pub uri_file: String,
    #[serde(default)]
    pub partition_index: u64,
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub format: FileFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    #[default]
    Unspecified,
    Parquet,
    Orc,
    Arrow,
    Dwrf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTable {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub input: Option<Rel>,
    pub condition: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub input: Option<Rel>,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub input: Option<Rel>,
    #[serde(default)]
    pub groupings: Vec<Grouping>,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub grouping_expressions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub measure: Option<AggregateFunction>,
    /// Optional boolean mask restricting the rows fed to the measure.
    #[serde(default)]
    pub filter: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFunction {
    pub function_reference: u32,
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,
    pub output_type: Option<Type>,
    #[serde(default)]
    pub phase: AggregationPhase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPhase {
    #[default]
    Unspecified,
    InitialToIntermediate,
    IntermediateToIntermediate,
    InitialToResult,
    IntermediateToResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub input: Option<Rel>,
    pub sorts: Vec<SortField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub expr: Option<Expression>,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Unspecified,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
    Clustered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub input: Option<Rel>,
    #[serde(default)]
    pub offset: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRel {
    #[serde(default)]
    pub common: Option<RelCommon>,
    pub left: Option<Rel>,
    pub right: Option<Rel>,
    pub expression: Option<Expression>,
    #[serde(default)]
    pub post_join_filter: Option<Expression>,
    #[serde(default)]
    pub r#type: JoinRelType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRelType {
    #[default]
    Unspecified,
    Inner,
    Outer,
    Left,
    Right,
    Semi,
    Anti,
    Single,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Literal(Literal),
    Selection(FieldReference),
    ScalarFunction(ScalarFunction),
    IfThen(Box<IfThen>),
}

/// Direct reference to a field of the input row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    pub field: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarFunction {
    pub function_reference: u32,
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,
    pub output_type: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionArgument {
    Value(Expression),
    Type(Type),
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfThen {
    pub ifs: Vec<IfClause>,
    pub r#else: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfClause {
    pub r#if: Expression,
    pub then: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    #[serde(default)]
    pub nullable: bool,
    pub literal_type: LiteralType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralType {
    Boolean(bool),
    I8(i32),
    I16(i32),
    I32(i32),
    I64(i64),
    Fp32(f32),
    Fp64(f64),
    String(String),
    Binary(Vec<u8>),
    /// Days since the unix epoch.
    Date(i32),
    /// Microseconds since the unix epoch.
    Timestamp(i64),
    /// Microseconds since the unix epoch, UTC.
    TimestampTz(i64),
    Decimal(DecimalLiteral),
    Null(Type),
}

/// Decimal literal as 16 bytes of little-endian two's complement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecimalLiteral {
    pub value: Vec<u8>,
    pub precision: i32,
    pub scale: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Fp32,
    Fp64,
    String,
    Binary,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    IntervalYear,
    IntervalDay,
    Uuid,
    FixedChar { length: i32 },
    VarChar { length: i32 },
    FixedBinary { length: i32 },
    Decimal { precision: i32, scale: i32 },
    Struct { types: Vec<Type> },
    List { r#type: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    UserDefined { type_reference: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_tree_is_serializable() {
        let plan = Plan {
            extension_uris: vec![SimpleExtensionUri {
                extension_uri_anchor: 1,
                uri: "/functions_comparison.yaml".to_string(),
            }],
            extensions: vec![SimpleExtensionDeclaration::ExtensionFunction(
                ExtensionFunctionDecl {
                    extension_uri_reference: 1,
                    function_anchor: 1,
                    name: "gte:i32_i32".to_string(),
                },
            )],
            relations: vec![PlanRel::Root(RelRoot {
                input: Some(Rel::Filter(Box::new(FilterRel {
                    common: None,
                    input: Some(Rel::Read(Box::new(ReadRel {
                        common: None,
                        base_schema: Some(NamedStruct {
                            names: vec!["x".to_string()],
                            types: vec![Type::I32],
                        }),
                        filter: None,
                        column_ranges: vec![],
                        read_type: Some(ReadType::NamedTable(NamedTable {
                            names: vec!["t".to_string()],
                        })),
                    }))),
                    condition: Some(Expression::ScalarFunction(ScalarFunction {
                        function_reference: 1,
                        arguments: vec![
                            FunctionArgument::Value(Expression::Selection(FieldReference {
                                field: 0,
                            })),
                            FunctionArgument::Value(Expression::Literal(Literal {
                                nullable: false,
                                literal_type: LiteralType::I32(5),
                            })),
                        ],
                        output_type: Some(Type::Bool),
                    })),
                }))),
                names: vec!["x".to_string()],
            })],
        };

        let json = serde_json::to_string(&plan).expect("serialize");
        let back: Plan = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, plan);
    }
}
