//! Bidirectional translation between FFQ native plans and interchange plans.
//!
//! Architecture role:
//! - loads and merges extension catalogs ([`Catalog`])
//! - resolves call signatures to catalog variants ([`FunctionResolver`])
//! - converts plan trees both ways through [`PlanConverter`]
//!
//! Key modules:
//! - [`catalog`], [`lookup`], [`collector`]
//! - [`expr`], [`plan`]
//! - [`filter`], [`join`]
//! - [`proto`]

pub mod catalog;
pub mod collector;
pub mod context;
pub mod expr;
pub mod filter;
pub mod function;
pub mod join;
pub mod literal;
pub mod lookup;
pub mod mappings;
pub mod plan;
pub mod proto;
pub mod signature;
pub mod split;
pub mod type_convert;
pub mod types;

use std::sync::Arc;

use ffq_common::{ConverterConfig, Result};
use ffq_planner::PlanNode;

pub use catalog::{Catalog, CatalogSource, TypeAnchor};
pub use collector::ExtensionCollector;
pub use context::{InboundContext, OutboundContext};
pub use expr::CallConverter;
pub use function::{FunctionKind, FunctionVariant};
pub use lookup::FunctionResolver;
pub use mappings::FunctionMappings;
pub use plan::ConvertedPlan;
pub use signature::Signature;
pub use split::{SplitFormat, SplitInfo};

/// Entry point for plan translation.
///
/// Holds the immutable catalog and resolvers built once at construction;
/// each conversion call owns its own anchor table, so one converter can
/// serve concurrent calls.
pub struct PlanConverter {
    catalog: Arc<Catalog>,
    mappings: Arc<FunctionMappings>,
    scalar: FunctionResolver,
    aggregate: FunctionResolver,
    call_converters: Vec<Box<dyn CallConverter>>,
    config: ConverterConfig,
}

impl PlanConverter {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::build(catalog, Arc::new(FunctionMappings::default()), ConverterConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, config: ConverterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(
            catalog,
            Arc::new(FunctionMappings::default()),
            config,
        ))
    }

    /// Rebuilds the resolvers around a different name-mapping table.
    pub fn with_mappings(self, mappings: FunctionMappings) -> Self {
        let mut rebuilt = Self::build(self.catalog, Arc::new(mappings), self.config);
        rebuilt.call_converters = self.call_converters;
        rebuilt
    }

    fn build(catalog: Arc<Catalog>, mappings: Arc<FunctionMappings>, config: ConverterConfig) -> Self {
        let scalar = FunctionResolver::new(FunctionKind::Scalar, &catalog, mappings.clone());
        let aggregate = FunctionResolver::new(FunctionKind::Aggregate, &catalog, mappings.clone());
        Self {
            catalog,
            mappings,
            scalar,
            aggregate,
            call_converters: expr::default_call_converters(),
            config,
        }
    }

    /// Adds a call converter ahead of the generic scalar-function converter.
    pub fn register_call_converter(&mut self, converter: Box<dyn CallConverter>) {
        let at = self.call_converters.len().saturating_sub(1);
        self.call_converters.insert(at, converter);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn resolver(&self, kind: FunctionKind) -> &FunctionResolver {
        match kind {
            FunctionKind::Scalar => &self.scalar,
            FunctionKind::Aggregate => &self.aggregate,
        }
    }

    /// Native → interchange.
    pub fn to_substrait(&self, root: &PlanNode) -> Result<proto::Plan> {
        let ctx = OutboundContext {
            catalog: &self.catalog,
            scalar: &self.scalar,
            aggregate: &self.aggregate,
            call_converters: &self.call_converters,
            config: &self.config,
            collector: ExtensionCollector::new(),
        };
        plan::to_proto_plan(root, ctx)
    }

    /// Interchange → native, with split metadata for file-backed scans.
    pub fn from_substrait(&self, plan: &proto::Plan) -> Result<ConvertedPlan> {
        let ctx = InboundContext::from_header(plan, &self.mappings, &self.config)?;
        plan::from_proto_plan(plan, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_schema::DataType;
    use ffq_common::FfqError;
    use ffq_planner::Expr;

    struct UpperConverter;

    impl CallConverter for UpperConverter {
        fn name(&self) -> &str {
            "upper"
        }

        fn convert(
            &self,
            name: &str,
            _args: &[Expr],
            _return_type: &DataType,
            _ctx: &mut OutboundContext<'_>,
            _depth: usize,
        ) -> Result<Option<proto::Expression>> {
            if name != "upper" {
                return Ok(None);
            }
            Err(FfqError::Unsupported("upper".to_string()))
        }
    }

    #[test]
    fn registered_converters_run_before_the_scalar_converter() {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));
        let mut converter = PlanConverter::new(catalog);
        converter.register_call_converter(Box::new(UpperConverter));
        let names = converter
            .call_converters
            .iter()
            .map(|c| c.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["if_then", "upper", "scalar_function"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));
        let config = ConverterConfig {
            max_plan_depth: 0,
            ..ConverterConfig::default()
        };
        assert!(matches!(
            PlanConverter::with_config(catalog, config),
            Err(FfqError::InvalidConfig(_))
        ));
    }
}
