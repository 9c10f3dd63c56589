use serde::{Deserialize, Serialize};

use crate::error::{FfqError, Result};

/// Settings shared by the inbound and outbound plan converters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Deepest plan tree a single conversion call will recurse into.
    pub max_plan_depth: usize,
    /// Deepest expression tree a single conversion call will recurse into.
    pub max_expr_depth: usize,
    /// Prefix of synthetic output column names (`{prefix}{node_id}_{column}`).
    pub node_name_prefix: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_plan_depth: 256,
            max_expr_depth: 512,
            node_name_prefix: "n".to_string(),
        }
    }
}

impl ConverterConfig {
    /// Rejects settings no conversion could succeed under.
    pub fn validate(&self) -> Result<()> {
        if self.max_plan_depth == 0 {
            return Err(FfqError::InvalidConfig(
                "max_plan_depth must be greater than zero".to_string(),
            ));
        }
        if self.max_expr_depth == 0 {
            return Err(FfqError::InvalidConfig(
                "max_expr_depth must be greater than zero".to_string(),
            ));
        }
        if self.node_name_prefix.is_empty() {
            return Err(FfqError::InvalidConfig(
                "node_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Synthetic output column name for column `column` of node `node_id`.
    pub fn node_name(&self, node_id: impl std::fmt::Display, column: usize) -> String {
        format!("{}{}_{}", self.node_name_prefix, node_id, column)
    }
}
