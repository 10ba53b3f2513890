//! Hierarchy Events
//!
//! Events emitted by the store after a structural mutation commits. They let
//! other parts of the application (caches, search indexers, UI push) react to
//! tree changes without coupling to the storage layer.
//!
//! # Architecture
//!
//! Events are published on a tokio broadcast channel. Sending never blocks and
//! never fails the mutation: with no subscribers the event is simply dropped.
//! Rolled-back mutations emit nothing.

use crate::models::{HierarchyKind, Node, NodeId, RebuildReport};
use serde::{Deserialize, Serialize};

/// Capacity of the broadcast channel; slow subscribers observe `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Structural change committed to a hierarchy kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HierarchyEvent {
    /// A node was inserted (final numbering included)
    NodeInserted { node: Node },

    /// A subtree was moved; `node` is the moved root after renumbering
    #[serde(rename_all = "camelCase")]
    NodeMoved {
        node: Node,
        old_parent_id: Option<NodeId>,
    },

    /// A node and its descendants were removed
    #[serde(rename_all = "camelCase")]
    SubtreeDeleted {
        kind: HierarchyKind,
        node_id: NodeId,
        removed: u64,
    },

    /// A kind was renumbered from its parent references
    KindRebuilt {
        kind: HierarchyKind,
        report: RebuildReport,
    },
}

impl HierarchyEvent {
    /// Stable event name, e.g. `taxonomy:inserted`
    pub fn event_type(&self) -> String {
        let (kind, action) = match self {
            HierarchyEvent::NodeInserted { node } => (node.kind, "inserted"),
            HierarchyEvent::NodeMoved { node, .. } => (node.kind, "moved"),
            HierarchyEvent::SubtreeDeleted { kind, .. } => (*kind, "deleted"),
            HierarchyEvent::KindRebuilt { kind, .. } => (*kind, "rebuilt"),
        };
        format!("{}:{}", kind, action)
    }

    /// Kind whose numbering changed
    pub fn kind(&self) -> HierarchyKind {
        match self {
            HierarchyEvent::NodeInserted { node } | HierarchyEvent::NodeMoved { node, .. } => {
                node.kind
            }
            HierarchyEvent::SubtreeDeleted { kind, .. }
            | HierarchyEvent::KindRebuilt { kind, .. } => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Contract test: documents the JSON shape subscribers receive
    #[test]
    fn test_subtree_deleted_json_format() {
        let event = HierarchyEvent::SubtreeDeleted {
            kind: HierarchyKind::Menu,
            node_id: uuid::Uuid::nil(),
            removed: 3,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "subtreeDeleted",
                "kind": "menu",
                "nodeId": "00000000-0000-0000-0000-000000000000",
                "removed": 3
            })
        );
        assert_eq!(event.event_type(), "menu:deleted");
        assert_eq!(event.kind(), HierarchyKind::Menu);
    }
}
