//! Per-call conversion state for both directions.

use std::collections::HashMap;

use arrow_schema::DataType;
use ffq_common::{ConverterConfig, FfqError, PlanNodeId, PlanNodeIdGenerator, Result};

use crate::catalog::Catalog;
use crate::collector::ExtensionCollector;
use crate::expr::CallConverter;
use crate::function::FunctionKind;
use crate::lookup::FunctionResolver;
use crate::mappings::FunctionMappings;
use crate::proto::{self, SimpleExtensionDeclaration};
use crate::split::SplitInfo;
use crate::type_convert::{from_proto_type, to_proto_type};
use crate::types::UNKNOWN_TYPE;

/// State of one native → interchange call.
///
/// Borrows the shared, immutable catalog and resolvers; owns the anchor
/// table, which is discarded once the header has been rendered.
pub struct OutboundContext<'a> {
    pub(crate) catalog: &'a Catalog,
    pub(crate) scalar: &'a FunctionResolver,
    pub(crate) aggregate: &'a FunctionResolver,
    pub(crate) call_converters: &'a [Box<dyn CallConverter>],
    pub(crate) config: &'a ConverterConfig,
    pub(crate) collector: ExtensionCollector,
}

impl<'a> OutboundContext<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn resolver(&self, kind: FunctionKind) -> &'a FunctionResolver {
        match kind {
            FunctionKind::Scalar => self.scalar,
            FunctionKind::Aggregate => self.aggregate,
        }
    }

    pub fn config(&self) -> &'a ConverterConfig {
        self.config
    }

    pub fn collector(&mut self) -> &mut ExtensionCollector {
        &mut self.collector
    }

    pub fn convert_type(&mut self, dt: &DataType) -> Result<proto::Type> {
        to_proto_type(dt, self.catalog, &mut self.collector)
    }

    pub(crate) fn check_expr_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_expr_depth {
            return Err(FfqError::Structural(format!(
                "expression deeper than {} levels",
                self.config.max_expr_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn check_plan_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_plan_depth {
            return Err(FfqError::Structural(format!(
                "plan deeper than {} levels",
                self.config.max_plan_depth
            )));
        }
        Ok(())
    }
}

/// State of one interchange → native call.
///
/// Holds the plan's own anchor tables, the node id generator and the split
/// side table handed to the storage connector.
pub struct InboundContext<'a> {
    functions: HashMap<u32, String>,
    types: HashMap<u32, String>,
    mappings: &'a FunctionMappings,
    config: &'a ConverterConfig,
    ids: PlanNodeIdGenerator,
    pub(crate) splits: HashMap<PlanNodeId, SplitInfo>,
}

impl<'a> InboundContext<'a> {
    /// Reads the extension header of `plan`.
    ///
    /// Only the `unknown` placeholder type extension is accepted.
    pub fn from_header(
        plan: &proto::Plan,
        mappings: &'a FunctionMappings,
        config: &'a ConverterConfig,
    ) -> Result<Self> {
        let mut functions = HashMap::new();
        let mut types = HashMap::new();
        for decl in &plan.extensions {
            match decl {
                SimpleExtensionDeclaration::ExtensionFunction(f) => {
                    if functions.insert(f.function_anchor, f.name.clone()).is_some() {
                        return Err(FfqError::Structural(format!(
                            "function anchor {} declared twice",
                            f.function_anchor
                        )));
                    }
                }
                SimpleExtensionDeclaration::ExtensionType(t) => {
                    if !t.name.eq_ignore_ascii_case(UNKNOWN_TYPE) {
                        return Err(FfqError::Unsupported(format!(
                            "type extension '{}'",
                            t.name
                        )));
                    }
                    types.insert(t.type_anchor, t.name.clone());
                }
            }
        }
        Ok(Self {
            functions,
            types,
            mappings,
            config,
            ids: PlanNodeIdGenerator::new(),
            splits: HashMap::new(),
        })
    }

    pub fn config(&self) -> &'a ConverterConfig {
        self.config
    }

    /// Declared name of function anchor `anchor`, e.g. `gte:i32_i32`.
    pub fn function_key(&self, anchor: u32) -> Result<&str> {
        self.functions
            .get(&anchor)
            .map(String::as_str)
            .ok_or_else(|| {
                FfqError::FunctionLookup(format!("function anchor {anchor} is not declared"))
            })
    }

    /// Interchange function name of `anchor`, without its signature suffix.
    pub fn interchange_name(&self, anchor: u32) -> Result<&str> {
        let key = self.function_key(anchor)?;
        Ok(key.split_once(':').map_or(key, |(name, _)| name))
    }

    /// Native function name of `anchor`.
    pub fn native_name(&self, anchor: u32, kind: FunctionKind) -> Result<String> {
        let name = self.interchange_name(anchor)?;
        Ok(self.mappings.to_native(kind, name).to_string())
    }

    pub fn convert_type(&self, t: &proto::Type) -> Result<DataType> {
        from_proto_type(t, &self.types)
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        self.ids.next_id()
    }

    pub fn node_name(&self, id: PlanNodeId, column: usize) -> String {
        self.config.node_name(id, column)
    }

    pub(crate) fn check_expr_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_expr_depth {
            return Err(FfqError::Structural(format!(
                "expression deeper than {} levels",
                self.config.max_expr_depth
            )));
        }
        Ok(())
    }

    pub(crate) fn check_plan_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_plan_depth {
            return Err(FfqError::Structural(format!(
                "plan deeper than {} levels",
                self.config.max_plan_depth
            )));
        }
        Ok(())
    }
}
