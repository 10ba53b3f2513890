//! Data Models
//!
//! This module contains the data structures shared by every hierarchy kind:
//!
//! - `Node` - One row of a nested-set table
//! - `HierarchyKind` - Independent numbering spaces (taxonomy, menu, ...)
//! - `NewNode` / `SiblingPosition` - Insert and move requests
//! - `InvariantViolation` - Diagnostics produced by validation

mod kind;
mod node;
mod violation;

pub use kind::HierarchyKind;
pub use node::{
    DeleteResult, NewNode, Node, NodeId, RebuildReport, SiblingPosition, TreeNode,
};
pub use violation::InvariantViolation;
