//! Service Layer Error Types
//!
//! This module defines the errors of structural hierarchy operations. Every
//! variant maps to a stable reason code so an outer API layer can surface
//! them as one "structural operation failed" class.

use crate::db::DatabaseError;
use crate::models::{HierarchyKind, InvariantViolation, NodeId};
use thiserror::Error;

/// Hierarchy operation errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Referenced node, parent or anchor sibling does not exist
    #[error("Node not found in {kind}: {id}")]
    NotFound { kind: HierarchyKind, id: NodeId },

    /// Move target is the node itself or one of its descendants
    #[error("Cannot move node {node_id} under its own subtree member {target_parent_id}")]
    CyclicMove {
        node_id: NodeId,
        target_parent_id: NodeId,
    },

    /// Operation is not allowed in the current tree state
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Post-mutation check failed; the transaction was rolled back
    #[error(
        "Invariant violation in {kind}: {} problem(s), first: {}",
        .violations.len(),
        first_violation(.violations)
    )]
    InvariantViolation {
        kind: HierarchyKind,
        violations: Vec<InvariantViolation>,
    },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Attributes could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HierarchyError {
    /// Create a not found error
    pub fn not_found(kind: HierarchyKind, id: NodeId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Create a cyclic move error
    pub fn cyclic_move(node_id: NodeId, target_parent_id: NodeId) -> Self {
        Self::CyclicMove {
            node_id,
            target_parent_id,
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant_violation(kind: HierarchyKind, violations: Vec<InvariantViolation>) -> Self {
        Self::InvariantViolation { kind, violations }
    }

    /// Stable reason code for API responses and metrics labels
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::CyclicMove { .. } => "cyclic_move",
            Self::InvalidOperation { .. } => "invalid_operation",
            Self::InvariantViolation { .. } => "invariant_violation",
            Self::Database(e) if e.is_transient() => "storage_busy",
            Self::Database(_) | Self::Serialization(_) => "storage_failure",
        }
    }

    /// Whether re-executing the whole mutation from scratch may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(e) if e.is_transient())
    }
}

fn first_violation(violations: &[InvariantViolation]) -> String {
    violations
        .first()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none recorded".to_string())
}

impl From<serde_json::Error> for HierarchyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
