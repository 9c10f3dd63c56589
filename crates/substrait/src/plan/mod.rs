//! Plan-tree conversion in both directions.
//!
//! Both directions are exhaustive matches over a closed set of node kinds;
//! every case converts its inputs first and fails fast on the first
//! unsupported or malformed construct.

mod from_substrait;
mod to_substrait;

pub use from_substrait::{from_proto_plan, ConvertedPlan, LOCAL_FILES_TABLE};
pub use to_substrait::to_proto_plan;

use ffq_common::{FfqError, Result};
use ffq_planner::{AggregationStep, SortOrder};

use crate::proto::{AggregationPhase, SortDirection};

pub fn phase_to_proto(step: AggregationStep) -> AggregationPhase {
    match step {
        AggregationStep::Partial => AggregationPhase::InitialToIntermediate,
        AggregationStep::Intermediate => AggregationPhase::IntermediateToIntermediate,
        AggregationStep::Single => AggregationPhase::InitialToResult,
        AggregationStep::Final => AggregationPhase::IntermediateToResult,
    }
}

pub fn phase_from_proto(phase: AggregationPhase) -> Result<AggregationStep> {
    match phase {
        AggregationPhase::InitialToIntermediate => Ok(AggregationStep::Partial),
        AggregationPhase::IntermediateToIntermediate => Ok(AggregationStep::Intermediate),
        AggregationPhase::InitialToResult => Ok(AggregationStep::Single),
        AggregationPhase::IntermediateToResult => Ok(AggregationStep::Final),
        AggregationPhase::Unspecified => Err(FfqError::Unsupported(
            "unspecified aggregation phase".to_string(),
        )),
    }
}

pub fn sort_to_proto(order: SortOrder) -> SortDirection {
    match order {
        SortOrder::AscNullsFirst => SortDirection::AscNullsFirst,
        SortOrder::AscNullsLast => SortDirection::AscNullsLast,
        SortOrder::DescNullsFirst => SortDirection::DescNullsFirst,
        SortOrder::DescNullsLast => SortDirection::DescNullsLast,
    }
}

pub fn sort_from_proto(direction: SortDirection) -> Result<SortOrder> {
    match direction {
        SortDirection::AscNullsFirst => Ok(SortOrder::AscNullsFirst),
        SortDirection::AscNullsLast => Ok(SortOrder::AscNullsLast),
        SortDirection::DescNullsFirst => Ok(SortOrder::DescNullsFirst),
        SortDirection::DescNullsLast => Ok(SortOrder::DescNullsLast),
        other => Err(FfqError::Unsupported(format!("sort direction {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_phase_round_trips() {
        for step in [
            AggregationStep::Partial,
            AggregationStep::Intermediate,
            AggregationStep::Single,
            AggregationStep::Final,
        ] {
            assert_eq!(phase_from_proto(phase_to_proto(step)).expect("phase"), step);
        }
        assert_eq!(
            phase_to_proto(AggregationStep::Partial),
            AggregationPhase::InitialToIntermediate
        );
        assert_eq!(
            phase_to_proto(AggregationStep::Final),
            AggregationPhase::IntermediateToResult
        );
        assert!(matches!(
            phase_from_proto(AggregationPhase::Unspecified),
            Err(FfqError::Unsupported(_))
        ));
    }

    #[test]
    fn sort_direction_mapping() {
        for order in [
            SortOrder::AscNullsFirst,
            SortOrder::AscNullsLast,
            SortOrder::DescNullsFirst,
            SortOrder::DescNullsLast,
        ] {
            assert_eq!(sort_from_proto(sort_to_proto(order)).expect("order"), order);
        }
        assert!(sort_from_proto(SortDirection::Clustered).is_err());
        assert!(sort_from_proto(SortDirection::Unspecified).is_err());
    }
}
