//! Node Data Structures
//!
//! This module defines the `Node` row shared by every hierarchy kind together
//! with the request and result types that travel across the `HierarchyStore`
//! contract.
//!
//! # Interval Encoding
//!
//! Each node carries a `[left, right]` interval. A node's interval strictly
//! contains the intervals of all its descendants and is disjoint from every
//! non-descendant, so subtree membership is a pair of integer comparisons:
//!
//! ```text
//!            A (1,8)
//!           /       \
//!       B (2,3)    C (4,7)
//!                     |
//!                  D (5,6)
//! ```
//!
//! `left`, `right`, `depth` and `ordering` are owned by the store. Callers
//! influence them only through a parent reference and a [`SiblingPosition`].
//!
//! # Examples
//!
//! ```rust
//! use canopy_core::models::{NewNode, SiblingPosition};
//! use serde_json::json;
//!
//! // Append a child at the end of its parent's children
//! let parent_id = uuid::Uuid::new_v4();
//! let request = NewNode::child_of(parent_id, json!({ "name": "Rust" }));
//!
//! // Insert a root before an existing root
//! let anchor = uuid::Uuid::new_v4();
//! let request = NewNode::root(json!({ "name": "Home" }))
//!     .with_position(SiblingPosition::Before(anchor));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::kind::HierarchyKind;

/// Identifier of a node within its kind
pub type NodeId = Uuid;

/// One row of a nested-set table.
///
/// # Fields
///
/// - `id`: Unique identifier
/// - `kind`: Numbering space this node belongs to
/// - `parent_id`: Parent node (None means this node is a root)
/// - `left` / `right`: Interval boundaries, `left < right`
/// - `depth`: Number of ancestors (roots are 0)
/// - `ordering`: Dense rank among siblings, left to right
/// - `attributes`: Opaque entity payload (name, slug, status, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub kind: HierarchyKind,
    pub parent_id: Option<NodeId>,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
    pub ordering: i64,
    #[serde(default)]
    pub attributes: Value,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Whether this node has no descendants
    pub fn is_leaf(&self) -> bool {
        self.right - self.left == 1
    }

    /// Number of strict descendants implied by the interval
    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    /// Whether this node is `other` or one of its descendants, by interval
    pub fn is_within(&self, other: &Node) -> bool {
        other.left <= self.left && self.right <= other.right
    }
}

/// Where a new or moved node lands among its future siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "siblingId", rename_all = "camelCase")]
pub enum SiblingPosition {
    /// After every existing sibling
    #[default]
    Last,
    /// Before every existing sibling
    First,
    /// Immediately before the given sibling
    Before(NodeId),
    /// Immediately after the given sibling
    After(NodeId),
}

impl SiblingPosition {
    /// Sibling this position is anchored on, if any
    pub fn anchor(&self) -> Option<NodeId> {
        match self {
            SiblingPosition::Before(id) | SiblingPosition::After(id) => Some(*id),
            SiblingPosition::Last | SiblingPosition::First => None,
        }
    }
}

/// Parameters for inserting a node
///
/// `id` is optional: callers that pre-generate identifiers pass them through,
/// everyone else gets a v4 UUID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub id: Option<NodeId>,
    pub parent_id: Option<NodeId>,
    pub position: SiblingPosition,
    pub attributes: Value,
}

impl NewNode {
    /// New root, appended after the existing roots
    pub fn root(attributes: Value) -> Self {
        Self {
            id: None,
            parent_id: None,
            position: SiblingPosition::Last,
            attributes,
        }
    }

    /// New child of `parent_id`, appended after its existing children
    pub fn child_of(parent_id: NodeId, attributes: Value) -> Self {
        Self {
            id: None,
            parent_id: Some(parent_id),
            position: SiblingPosition::Last,
            attributes,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_position(mut self, position: SiblingPosition) -> Self {
        self.position = position;
        self
    }
}

/// Result of a delete operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Rows removed: the node plus all of its descendants
    pub removed: u64,
}

/// A node with its children materialised, built from one subtree scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Assemble a tree from a pre-order (left-ordered) subtree listing
    ///
    /// The first element is the root of the returned tree. Returns `None` for
    /// an empty listing.
    pub fn from_preorder(nodes: Vec<Node>) -> Option<TreeNode> {
        let mut iter = nodes.into_iter();
        let root = iter.next()?;

        // Stack of open nodes; each is closed once a later node falls outside it.
        let mut stack: Vec<TreeNode> = vec![TreeNode {
            node: root,
            children: Vec::new(),
        }];

        for node in iter {
            while stack.len() > 1 {
                let top = &stack[stack.len() - 1].node;
                if node.left > top.right {
                    let done = stack.pop()?;
                    stack.last_mut()?.children.push(done);
                } else {
                    break;
                }
            }
            stack.push(TreeNode {
                node,
                children: Vec::new(),
            });
        }

        while stack.len() > 1 {
            let done = stack.pop()?;
            stack.last_mut()?.children.push(done);
        }
        stack.pop()
    }

    /// Number of nodes in this tree, root included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Outcome of rebuilding a kind's intervals from its parent references
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    /// Rows read from the kind
    pub examined: usize,
    /// Rows whose left/right/depth/ordering/parent changed
    pub changed: usize,
    /// Rows whose parent was missing and were turned into roots
    pub orphans_promoted: usize,
}
