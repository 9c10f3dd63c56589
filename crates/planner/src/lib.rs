//! Native plan and expression model of the FFQ engine.
//!
//! Architecture role:
//! - defines the closed [`PlanNode`] operator tree with schemas fixed at construction
//! - defines typed [`Expr`] trees and [`LiteralValue`] scalars
//! - renders plans for logs and tests via [`explain_plan`]

pub mod explain;
pub mod expr;
pub mod literal;
pub mod physical_plan;

pub use explain::explain_plan;
pub use expr::{AggregateCall, Expr};
pub use literal::{literal_at, literals_to_array, LiteralValue};
pub use physical_plan::*;
