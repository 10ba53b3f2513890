//! Invariant violations reported by hierarchy validation
//!
//! Validation collects every problem it finds instead of stopping at the
//! first, so repair tooling can show the full extent of a corruption.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::node::NodeId;

/// A single broken nested-set invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InvariantViolation {
    /// `left >= right`, or the interval width is odd
    #[serde(rename_all = "camelCase")]
    InvalidInterval { node_id: NodeId, left: i64, right: i64 },

    /// `(right - left - 1) / 2` disagrees with the rows actually contained
    #[serde(rename_all = "camelCase")]
    DescendantCountMismatch {
        node_id: NodeId,
        expected: i64,
        actual: i64,
    },

    /// Depth is not parent depth + 1 (or not 0 for a root)
    #[serde(rename_all = "camelCase")]
    DepthMismatch {
        node_id: NodeId,
        expected: i64,
        actual: i64,
    },

    /// `parent_id` does not name the innermost containing node
    #[serde(rename_all = "camelCase")]
    ParentMismatch {
        node_id: NodeId,
        recorded: Option<NodeId>,
        containing: Option<NodeId>,
    },

    /// Two intervals overlap without one containing the other
    #[serde(rename_all = "camelCase")]
    OverlappingIntervals { first: NodeId, second: NodeId },

    /// `parent_id` references a node that does not exist in the kind
    #[serde(rename_all = "camelCase")]
    OrphanedNode { node_id: NodeId, parent_id: NodeId },

    /// Boundaries are not the contiguous sequence `1..=2n`
    #[serde(rename_all = "camelCase")]
    BoundaryGap { expected: i64, found: i64 },

    /// Sibling `ordering` is not dense or disagrees with interval order
    #[serde(rename_all = "camelCase")]
    OrderingMismatch {
        node_id: NodeId,
        expected: i64,
        actual: i64,
    },
}

impl InvariantViolation {
    /// Node the violation is reported against, when there is one
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            InvariantViolation::InvalidInterval { node_id, .. }
            | InvariantViolation::DescendantCountMismatch { node_id, .. }
            | InvariantViolation::DepthMismatch { node_id, .. }
            | InvariantViolation::ParentMismatch { node_id, .. }
            | InvariantViolation::OrphanedNode { node_id, .. }
            | InvariantViolation::OrderingMismatch { node_id, .. } => Some(*node_id),
            InvariantViolation::OverlappingIntervals { first, .. } => Some(*first),
            InvariantViolation::BoundaryGap { .. } => None,
        }
    }
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::InvalidInterval {
                node_id,
                left,
                right,
            } => write!(f, "node {} has invalid interval [{}, {}]", node_id, left, right),
            InvariantViolation::DescendantCountMismatch {
                node_id,
                expected,
                actual,
            } => write!(
                f,
                "node {} interval implies {} descendants but contains {}",
                node_id, expected, actual
            ),
            InvariantViolation::DepthMismatch {
                node_id,
                expected,
                actual,
            } => write!(
                f,
                "node {} has depth {} (expected {})",
                node_id, actual, expected
            ),
            InvariantViolation::ParentMismatch {
                node_id,
                recorded,
                containing,
            } => write!(
                f,
                "node {} records parent {:?} but is contained by {:?}",
                node_id, recorded, containing
            ),
            InvariantViolation::OverlappingIntervals { first, second } => {
                write!(f, "intervals of {} and {} partially overlap", first, second)
            }
            InvariantViolation::OrphanedNode { node_id, parent_id } => {
                write!(f, "node {} references missing parent {}", node_id, parent_id)
            }
            InvariantViolation::BoundaryGap { expected, found } => {
                write!(f, "boundary {} expected but found {}", expected, found)
            }
            InvariantViolation::OrderingMismatch {
                node_id,
                expected,
                actual,
            } => write!(
                f,
                "node {} has ordering {} (expected {})",
                node_id, actual, expected
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_node_id_of_each_violation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let orphan = InvariantViolation::OrphanedNode {
            node_id: a,
            parent_id: b,
        };
        assert_eq!(orphan.node_id(), Some(a));

        let overlap = InvariantViolation::OverlappingIntervals { first: b, second: a };
        assert_eq!(overlap.node_id(), Some(b));

        let gap = InvariantViolation::BoundaryGap {
            expected: 5,
            found: 7,
        };
        assert_eq!(gap.node_id(), None);
        assert_eq!(gap.to_string(), "boundary 5 expected but found 7");
    }
}
