//! Typed identifiers shared by native plans and the translator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one native plan node, unique within a plan tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(
    /// Raw numeric id value.
    pub u64,
);

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`PlanNodeId`] values for one plan-building call.
#[derive(Debug, Default)]
pub struct PlanNodeIdGenerator {
    next: u64,
}

impl PlanNodeIdGenerator {
    /// Creates a generator whose first id is `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next unused id.
    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_hands_out_increasing_ids() {
        let mut ids = PlanNodeIdGenerator::new();
        assert_eq!(ids.next_id(), PlanNodeId(0));
        assert_eq!(ids.next_id(), PlanNodeId(1));
        assert_eq!(ids.next_id().to_string(), "2");
    }
}
