//! HierarchyStore Trait - Structural Tree Operations
//!
//! This module defines the `HierarchyStore` trait through which application
//! code performs every structural change to a hierarchy. Entity services
//! (taxonomy terms, menu links, comments, ...) own their attributes; the store
//! owns `parent_id`, the interval boundaries, depth and sibling ordering.
//!
//! # Architecture
//!
//! - **One numbering space per kind**: operations on different kinds never
//!   touch each other's rows
//! - **Atomic mutations**: insert, delete, move and rebuild either commit a
//!   fully renumbered tree or leave it untouched
//! - **Snapshot reads**: queries never observe a half-applied renumbering
//!
//! # Examples
//!
//! ```rust,no_run
//! use canopy_core::config::HierarchyConfig;
//! use canopy_core::models::{HierarchyKind, NewNode};
//! use canopy_core::services::{HierarchyStore, NestedSetStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HierarchyConfig::with_database_path("./data/tree.db");
//!     let store: Arc<dyn HierarchyStore> = Arc::new(NestedSetStore::open(config).await?);
//!
//!     let root = store
//!         .insert(HierarchyKind::Menu, NewNode::root(json!({"title": "Main"})))
//!         .await?;
//!     store
//!         .insert(HierarchyKind::Menu, NewNode::child_of(root.id, json!({"title": "About"})))
//!         .await?;
//!
//!     assert!(store.validate(HierarchyKind::Menu).await?.is_empty());
//!     Ok(())
//! }
//! ```

use crate::models::{
    DeleteResult, HierarchyKind, InvariantViolation, NewNode, Node, NodeId, RebuildReport,
    SiblingPosition, TreeNode,
};
use crate::services::error::HierarchyError;
use async_trait::async_trait;

/// Structural operations over nested-set hierarchies
///
/// Implementations must be `Send + Sync`; the store is shared as
/// `Arc<dyn HierarchyStore>`.
///
/// # Method Categories
///
/// - **Mutations**: insert, delete, move_node
/// - **Queries**: get, parent, children, descendants, ancestors, siblings,
///   roots, path_to_root, subtree, tree, count
/// - **Integrity**: validate, rebuild
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    //
    // MUTATIONS
    //

    /// Insert a leaf at the requested sibling position
    ///
    /// # Errors
    ///
    /// - `NotFound` if the parent or the anchor sibling does not exist
    /// - `InvalidOperation` if the id is taken or the anchor is not a child
    ///   of the requested parent
    /// - `InvariantViolation` if the post-write check failed (rolled back)
    async fn insert(&self, kind: HierarchyKind, node: NewNode) -> Result<Node, HierarchyError>;

    /// Remove a node and, when `cascade` is set, its whole subtree
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    /// - `InvalidOperation` if the node has children and `cascade` is false
    async fn delete(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        cascade: bool,
    ) -> Result<DeleteResult, HierarchyError>;

    /// Relocate a node and its subtree; `new_parent_id = None` makes it a root
    ///
    /// Returns the moved node with its new numbering.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node, the new parent or the anchor does not exist
    /// - `CyclicMove` if the new parent is the node or one of its descendants
    /// - `InvalidOperation` if the anchor is the node itself or not a child
    ///   of the new parent
    async fn move_node(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        position: SiblingPosition,
    ) -> Result<Node, HierarchyError>;

    //
    // QUERIES
    //

    async fn get(&self, kind: HierarchyKind, id: NodeId) -> Result<Option<Node>, HierarchyError>;

    /// The direct parent, `None` for a root
    async fn parent(&self, kind: HierarchyKind, id: NodeId)
        -> Result<Option<Node>, HierarchyError>;

    /// Direct children by sibling ordering
    async fn children(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError>;

    /// Every node strictly inside the subtree, in pre-order
    async fn descendants(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Vec<Node>, HierarchyError>;

    /// Every node strictly containing this one, root first
    async fn ancestors(&self, kind: HierarchyKind, id: NodeId)
        -> Result<Vec<Node>, HierarchyError>;

    /// Nodes with the same parent (roots for a root), excluding this one
    async fn siblings(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError>;

    async fn roots(&self, kind: HierarchyKind) -> Result<Vec<Node>, HierarchyError>;

    /// Ancestors followed by the node itself
    async fn path_to_root(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Vec<Node>, HierarchyError>;

    /// The node followed by its descendants, in pre-order
    async fn subtree(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError>;

    /// The subtree materialised as nested `TreeNode`s
    async fn tree(&self, kind: HierarchyKind, id: NodeId) -> Result<TreeNode, HierarchyError>;

    async fn count(&self, kind: HierarchyKind) -> Result<u64, HierarchyError>;

    //
    // INTEGRITY
    //

    /// Check every structural invariant of a kind; empty means consistent
    async fn validate(
        &self,
        kind: HierarchyKind,
    ) -> Result<Vec<InvariantViolation>, HierarchyError>;

    /// Recompute all numbering of a kind from its parent references
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if parent references form a cycle (nothing written)
    async fn rebuild(&self, kind: HierarchyKind) -> Result<RebuildReport, HierarchyError>;
}
