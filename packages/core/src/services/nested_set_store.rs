//! Nested-Set Store - libsql implementation of `HierarchyStore`
//!
//! Each mutation follows the same lifecycle:
//!
//! 1. Take the in-process lock of the kind (one writer per kind)
//! 2. `BEGIN IMMEDIATE` on a fresh connection (SQLite's writer lock)
//! 3. Resolve every referenced node and reject invalid requests before any write
//! 4. Run the range statements that renumber the kind
//! 5. Optionally re-validate the whole kind inside the transaction
//! 6. `COMMIT`, or `ROLLBACK` on any error
//! 7. Publish a `HierarchyEvent` (committed mutations only)
//!
//! Queries open a deferred transaction so multi-statement reads (resolve the
//! node, then scan its range) see one snapshot.

use crate::config::HierarchyConfig;
use crate::db::events::EVENT_CHANNEL_CAPACITY;
use crate::db::intervals::{insertion_point, LEAF_WIDTH};
use crate::db::{
    DatabaseService, DbInsertNodeParams, HierarchyEvent, MovePlan, Placement, Span,
};
use crate::models::{
    DeleteResult, HierarchyKind, InvariantViolation, NewNode, Node, NodeId, RebuildReport,
    SiblingPosition, TreeNode,
};
use crate::services::error::HierarchyError;
use crate::services::hierarchy_store::HierarchyStore;
use crate::services::integrity::{renumber_forest, validate_nodes};
use async_trait::async_trait;
use libsql::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use uuid::Uuid;

/// `HierarchyStore` backed by one libsql table per kind
#[derive(Clone)]
pub struct NestedSetStore {
    db: Arc<DatabaseService>,
    config: HierarchyConfig,

    /// One writer lock per kind, indexed by `lock_slot`
    locks: Arc<[Mutex<()>; 5]>,

    event_tx: broadcast::Sender<HierarchyEvent>,
}

fn lock_slot(kind: HierarchyKind) -> usize {
    match kind {
        HierarchyKind::Taxonomy => 0,
        HierarchyKind::Menu => 1,
        HierarchyKind::Organization => 2,
        HierarchyKind::Comment => 3,
        HierarchyKind::Media => 4,
    }
}

fn span_of(node: &Node) -> Span {
    Span::new(node.left, node.right)
}

impl NestedSetStore {
    /// Wrap an already opened database
    pub fn new(db: Arc<DatabaseService>, config: HierarchyConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            config,
            locks: Arc::new(Default::default()),
            event_tx,
        }
    }

    /// Open (or create) the database named by `config` and wrap it
    pub async fn open(config: HierarchyConfig) -> Result<Self, HierarchyError> {
        let db = DatabaseService::new(&config).await?;
        Ok(Self::new(Arc::new(db), config))
    }

    /// Underlying database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Receive every event published after this call
    ///
    /// ```no_run
    /// # use canopy_core::services::NestedSetStore;
    /// # use canopy_core::config::HierarchyConfig;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = NestedSetStore::open(HierarchyConfig::default()).await?;
    /// let mut rx = store.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("{}", event.event_type());
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<HierarchyEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: no subscribers is a normal state
    fn emit_event(&self, event: HierarchyEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn lock_kind(&self, kind: HierarchyKind) -> MutexGuard<'_, ()> {
        self.locks[lock_slot(kind)].lock().await
    }

    //
    // TRANSACTION LIFECYCLE
    //

    /// Connection with an open write transaction
    async fn begin_mutation(&self) -> Result<Connection, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        DatabaseService::begin_write(&conn).await?;
        Ok(conn)
    }

    /// Verify and commit a successful mutation, roll back anything else
    async fn finish_mutation<T>(
        &self,
        conn: &Connection,
        kind: HierarchyKind,
        outcome: Result<T, HierarchyError>,
    ) -> Result<T, HierarchyError> {
        let outcome = match outcome {
            Ok(value) => self.verify_in_transaction(conn, kind).await.map(|()| value),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                DatabaseService::commit(conn).await?;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    reason = e.reason_code(),
                    "Rolling back hierarchy mutation: {}",
                    e
                );
                DatabaseService::rollback(conn).await;
                Err(e)
            }
        }
    }

    async fn verify_in_transaction(
        &self,
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<(), HierarchyError> {
        if !self.config.verify_mutations {
            return Ok(());
        }
        let nodes = DatabaseService::db_get_all(conn, kind).await?;
        let violations = validate_nodes(&nodes);
        if violations.is_empty() {
            return Ok(());
        }
        tracing::error!(
            kind = %kind,
            count = violations.len(),
            "Mutation broke hierarchy invariants: {:?}",
            violations
        );
        Err(HierarchyError::invariant_violation(kind, violations))
    }

    /// Connection with an open read snapshot
    async fn begin_query(&self) -> Result<Connection, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        DatabaseService::begin_read(&conn).await?;
        Ok(conn)
    }

    async fn finish_query<T>(
        conn: &Connection,
        outcome: Result<T, HierarchyError>,
    ) -> Result<T, HierarchyError> {
        match outcome {
            Ok(value) => {
                DatabaseService::commit(conn).await?;
                Ok(value)
            }
            Err(e) => {
                DatabaseService::rollback(conn).await;
                Err(e)
            }
        }
    }

    //
    // RESOLUTION HELPERS
    //

    async fn require_node(
        conn: &Connection,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Node, HierarchyError> {
        DatabaseService::db_get_node(conn, kind, id)
            .await?
            .ok_or_else(|| HierarchyError::not_found(kind, id))
    }

    async fn require_parent(
        conn: &Connection,
        kind: HierarchyKind,
        parent_id: Option<NodeId>,
    ) -> Result<Option<Node>, HierarchyError> {
        match parent_id {
            Some(id) => Ok(Some(Self::require_node(conn, kind, id).await?)),
            None => Ok(None),
        }
    }

    /// Resolve a sibling position under `parent_id`
    ///
    /// The anchor must exist, must be a child of `parent_id` (a root when
    /// `None`) and must not be the node being moved.
    async fn resolve_placement(
        conn: &Connection,
        kind: HierarchyKind,
        position: &SiblingPosition,
        parent_id: Option<NodeId>,
        moving: Option<NodeId>,
    ) -> Result<Placement, HierarchyError> {
        let anchor = match position.anchor() {
            None => None,
            Some(anchor_id) => {
                if moving == Some(anchor_id) {
                    return Err(HierarchyError::invalid_operation(format!(
                        "node {} cannot be positioned relative to itself",
                        anchor_id
                    )));
                }
                let anchor = Self::require_node(conn, kind, anchor_id).await?;
                if anchor.parent_id != parent_id {
                    return Err(HierarchyError::invalid_operation(match parent_id {
                        Some(parent_id) => format!(
                            "anchor sibling {} is not a child of {}",
                            anchor_id, parent_id
                        ),
                        None => format!("anchor sibling {} is not a root", anchor_id),
                    }));
                }
                Some(span_of(&anchor))
            }
        };

        Placement::resolve(position, anchor)
            .ok_or_else(|| HierarchyError::invalid_operation("sibling position has no anchor"))
    }

    /// Boundary where a subtree placed at `placement` under `parent` starts
    async fn resolve_insertion_point(
        conn: &Connection,
        kind: HierarchyKind,
        placement: Placement,
        parent: Option<&Node>,
    ) -> Result<i64, HierarchyError> {
        let max_right = match (placement, parent) {
            (Placement::Last, None) => DatabaseService::db_max_right(conn, kind).await?,
            _ => 0,
        };
        Ok(insertion_point(placement, parent.map(span_of), max_right))
    }

    //
    // MUTATION BODIES (run inside the write transaction)
    //

    async fn insert_in_transaction(
        conn: &Connection,
        kind: HierarchyKind,
        new_node: NewNode,
    ) -> Result<Node, HierarchyError> {
        let id = new_node.id.unwrap_or_else(Uuid::new_v4);
        if DatabaseService::db_get_node(conn, kind, id).await?.is_some() {
            return Err(HierarchyError::invalid_operation(format!(
                "node {} already exists in {}",
                id, kind
            )));
        }

        let parent = Self::require_parent(conn, kind, new_node.parent_id).await?;
        let placement =
            Self::resolve_placement(conn, kind, &new_node.position, new_node.parent_id, None)
                .await?;
        let point = Self::resolve_insertion_point(conn, kind, placement, parent.as_ref()).await?;
        let depth = parent.as_ref().map(|p| p.depth + 1).unwrap_or(0);
        let attributes = serde_json::to_string(&new_node.attributes)?;

        tracing::debug!(kind = %kind, %id, point, depth, "Opening gap for new node");
        DatabaseService::db_shift_boundaries(conn, kind, point, LEAF_WIDTH).await?;
        DatabaseService::db_insert_node(
            conn,
            kind,
            DbInsertNodeParams {
                id,
                parent_id: new_node.parent_id,
                left: point,
                right: point + 1,
                depth,
                attributes: &attributes,
            },
        )
        .await?;
        DatabaseService::db_densify_ordering(conn, kind, new_node.parent_id).await?;

        Self::require_node(conn, kind, id).await
    }

    async fn delete_in_transaction(
        conn: &Connection,
        kind: HierarchyKind,
        id: NodeId,
        cascade: bool,
    ) -> Result<DeleteResult, HierarchyError> {
        let node = Self::require_node(conn, kind, id).await?;
        if !cascade && !node.is_leaf() {
            return Err(HierarchyError::invalid_operation(format!(
                "node {} has {} descendant(s); delete with cascade to remove them",
                id,
                node.descendant_count()
            )));
        }

        let span = span_of(&node);
        let removed = DatabaseService::db_delete_span(conn, kind, span).await?;
        tracing::debug!(kind = %kind, %id, removed, "Closing gap left by deleted subtree");
        DatabaseService::db_shift_boundaries(conn, kind, span.right + 1, -span.width()).await?;
        DatabaseService::db_densify_ordering(conn, kind, node.parent_id).await?;

        Ok(DeleteResult { removed })
    }

    /// Returns the moved node and its former parent
    async fn move_in_transaction(
        conn: &Connection,
        kind: HierarchyKind,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        position: SiblingPosition,
    ) -> Result<(Node, Option<NodeId>), HierarchyError> {
        let node = Self::require_node(conn, kind, id).await?;
        let parent = Self::require_parent(conn, kind, new_parent_id).await?;
        if let Some(parent) = &parent {
            if parent.is_within(&node) {
                return Err(HierarchyError::cyclic_move(id, parent.id));
            }
        }

        let placement =
            Self::resolve_placement(conn, kind, &position, new_parent_id, Some(id)).await?;
        let point = Self::resolve_insertion_point(conn, kind, placement, parent.as_ref()).await?;
        let new_depth = parent.as_ref().map(|p| p.depth + 1).unwrap_or(0);
        let plan = MovePlan::new(span_of(&node), point, new_depth - node.depth).ok_or_else(
            || HierarchyError::invalid_operation("target position lies inside the moved subtree"),
        )?;

        let old_parent_id = node.parent_id;
        if plan.is_noop() && old_parent_id == new_parent_id {
            tracing::debug!(kind = %kind, %id, "Move leaves node in place");
            return Ok((node, old_parent_id));
        }

        tracing::debug!(
            kind = %kind,
            %id,
            width = plan.width,
            target = plan.target,
            offset = plan.offset,
            depth_delta = plan.depth_delta,
            "Relocating subtree"
        );
        DatabaseService::db_park_span(conn, kind, plan.span, plan.depth_delta).await?;
        DatabaseService::db_shift_boundaries(conn, kind, plan.span.right + 1, -plan.width).await?;
        DatabaseService::db_shift_boundaries(conn, kind, plan.target, plan.width).await?;
        DatabaseService::db_unpark(conn, kind, plan.offset).await?;
        DatabaseService::db_set_parent(conn, kind, id, new_parent_id).await?;

        DatabaseService::db_densify_ordering(conn, kind, old_parent_id).await?;
        if new_parent_id != old_parent_id {
            DatabaseService::db_densify_ordering(conn, kind, new_parent_id).await?;
        }

        let moved = Self::require_node(conn, kind, id).await?;
        Ok((moved, old_parent_id))
    }

    async fn rebuild_in_transaction(
        conn: &Connection,
        kind: HierarchyKind,
    ) -> Result<RebuildReport, HierarchyError> {
        let nodes = DatabaseService::db_get_all(conn, kind).await?;
        let renumbering = renumber_forest(&nodes).map_err(|cycle| {
            HierarchyError::invalid_operation(format!(
                "parent references in {} form a cycle through node {}",
                kind, cycle.node_id
            ))
        })?;

        let current: HashMap<NodeId, &Node> = nodes.iter().map(|n| (n.id, n)).collect();
        let mut changed = 0;
        for numbering in &renumbering.numbering {
            let unchanged = current.get(&numbering.id).is_some_and(|n| {
                n.parent_id == numbering.parent_id
                    && n.left == numbering.left
                    && n.right == numbering.right
                    && n.depth == numbering.depth
                    && n.ordering == numbering.ordering
            });
            if !unchanged {
                DatabaseService::db_write_numbering(conn, kind, *numbering).await?;
                changed += 1;
            }
        }

        Ok(RebuildReport {
            examined: nodes.len(),
            changed,
            orphans_promoted: renumbering.orphans_promoted,
        })
    }
}

#[async_trait]
impl HierarchyStore for NestedSetStore {
    async fn insert(&self, kind: HierarchyKind, node: NewNode) -> Result<Node, HierarchyError> {
        let _guard = self.lock_kind(kind).await;
        let conn = self.begin_mutation().await?;
        let outcome = Self::insert_in_transaction(&conn, kind, node).await;
        let inserted = self.finish_mutation(&conn, kind, outcome).await?;

        tracing::info!(
            kind = %kind,
            id = %inserted.id,
            left = inserted.left,
            right = inserted.right,
            "Inserted node"
        );
        self.emit_event(HierarchyEvent::NodeInserted {
            node: inserted.clone(),
        });
        Ok(inserted)
    }

    async fn delete(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        cascade: bool,
    ) -> Result<DeleteResult, HierarchyError> {
        let _guard = self.lock_kind(kind).await;
        let conn = self.begin_mutation().await?;
        let outcome = Self::delete_in_transaction(&conn, kind, id, cascade).await;
        let result = self.finish_mutation(&conn, kind, outcome).await?;

        tracing::info!(kind = %kind, %id, removed = result.removed, "Deleted subtree");
        self.emit_event(HierarchyEvent::SubtreeDeleted {
            kind,
            node_id: id,
            removed: result.removed,
        });
        Ok(result)
    }

    async fn move_node(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        position: SiblingPosition,
    ) -> Result<Node, HierarchyError> {
        let _guard = self.lock_kind(kind).await;
        let conn = self.begin_mutation().await?;
        let outcome =
            Self::move_in_transaction(&conn, kind, id, new_parent_id, position).await;
        let (moved, old_parent_id) = self.finish_mutation(&conn, kind, outcome).await?;

        tracing::info!(
            kind = %kind,
            %id,
            left = moved.left,
            right = moved.right,
            depth = moved.depth,
            "Moved subtree"
        );
        self.emit_event(HierarchyEvent::NodeMoved {
            node: moved.clone(),
            old_parent_id,
        });
        Ok(moved)
    }

    async fn get(&self, kind: HierarchyKind, id: NodeId) -> Result<Option<Node>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(DatabaseService::db_get_node(&conn, kind, id).await?)
    }

    async fn parent(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Option<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            match node.parent_id {
                Some(parent_id) => DatabaseService::db_get_node(&conn, kind, parent_id)
                    .await
                    .map_err(HierarchyError::from),
                None => Ok(None),
            }
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn children(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            Self::require_node(&conn, kind, id).await?;
            Ok::<_, HierarchyError>(DatabaseService::db_get_children(&conn, kind, id).await?)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn descendants(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            let nodes = DatabaseService::db_get_descendants(&conn, kind, span_of(&node)).await?;
            Ok::<_, HierarchyError>(nodes)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn ancestors(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            let nodes = DatabaseService::db_get_ancestors(&conn, kind, span_of(&node)).await?;
            Ok::<_, HierarchyError>(nodes)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn siblings(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            let nodes = DatabaseService::db_get_siblings(&conn, kind, node.parent_id, id).await?;
            Ok::<_, HierarchyError>(nodes)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn roots(&self, kind: HierarchyKind) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        Ok(DatabaseService::db_get_roots(&conn, kind).await?)
    }

    async fn path_to_root(
        &self,
        kind: HierarchyKind,
        id: NodeId,
    ) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            let mut path = DatabaseService::db_get_ancestors(&conn, kind, span_of(&node)).await?;
            path.push(node);
            Ok::<_, HierarchyError>(path)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn subtree(&self, kind: HierarchyKind, id: NodeId) -> Result<Vec<Node>, HierarchyError> {
        let conn = self.begin_query().await?;
        let outcome = async {
            let node = Self::require_node(&conn, kind, id).await?;
            let nodes = DatabaseService::db_get_span(&conn, kind, span_of(&node)).await?;
            Ok::<_, HierarchyError>(nodes)
        }
        .await;
        Self::finish_query(&conn, outcome).await
    }

    async fn tree(&self, kind: HierarchyKind, id: NodeId) -> Result<TreeNode, HierarchyError> {
        let nodes = self.subtree(kind, id).await?;
        TreeNode::from_preorder(nodes).ok_or_else(|| HierarchyError::not_found(kind, id))
    }

    async fn count(&self, kind: HierarchyKind) -> Result<u64, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let count = DatabaseService::db_count(&conn, kind).await?;
        Ok(count.max(0) as u64)
    }

    async fn validate(
        &self,
        kind: HierarchyKind,
    ) -> Result<Vec<InvariantViolation>, HierarchyError> {
        let conn = self.db.connect_with_timeout().await?;
        let nodes = DatabaseService::db_get_all(&conn, kind).await?;
        let violations = validate_nodes(&nodes);
        tracing::debug!(
            kind = %kind,
            nodes = nodes.len(),
            violations = violations.len(),
            "Validated hierarchy"
        );
        Ok(violations)
    }

    async fn rebuild(&self, kind: HierarchyKind) -> Result<RebuildReport, HierarchyError> {
        let _guard = self.lock_kind(kind).await;
        let conn = self.begin_mutation().await?;
        let outcome = Self::rebuild_in_transaction(&conn, kind).await;
        let report = self.finish_mutation(&conn, kind, outcome).await?;

        tracing::info!(
            kind = %kind,
            examined = report.examined,
            changed = report.changed,
            orphans_promoted = report.orphans_promoted,
            "Rebuilt hierarchy numbering"
        );
        self.emit_event(HierarchyEvent::KindRebuilt { kind, report });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_store() -> (NestedSetStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = HierarchyConfig::with_database_path(temp_dir.path().join("test.db"));
        let store = NestedSetStore::open(config).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_anchor_from_other_parent_is_rejected() {
        let (store, _temp_dir) = create_test_store().await;
        let kind = HierarchyKind::Menu;

        let a = store.insert(kind, NewNode::root(json!({}))).await.unwrap();
        let b = store.insert(kind, NewNode::root(json!({}))).await.unwrap();
        let a1 = store
            .insert(kind, NewNode::child_of(a.id, json!({})))
            .await
            .unwrap();

        let err = store
            .insert(
                kind,
                NewNode::child_of(b.id, json!({})).with_position(SiblingPosition::After(a1.id)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "invalid_operation");
        assert_eq!(store.count(kind).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_move_anchor_must_be_child_of_new_parent() {
        let (store, _temp_dir) = create_test_store().await;
        let kind = HierarchyKind::Taxonomy;

        let a = store.insert(kind, NewNode::root(json!({}))).await.unwrap();
        let b = store.insert(kind, NewNode::root(json!({}))).await.unwrap();
        let a1 = store
            .insert(kind, NewNode::child_of(a.id, json!({})))
            .await
            .unwrap();
        let a2 = store
            .insert(kind, NewNode::child_of(a.id, json!({})))
            .await
            .unwrap();
        let before = store.subtree(kind, a.id).await.unwrap();

        let rejected = [
            // anchor is a child of another parent
            (Some(b.id), SiblingPosition::Before(a2.id)),
            // anchor is a root while the new parent is a node
            (Some(b.id), SiblingPosition::After(a.id)),
            // anchor is not a root while the node becomes one
            (None, SiblingPosition::After(a2.id)),
        ];
        for (new_parent, position) in rejected {
            let err = store
                .move_node(kind, a1.id, new_parent, position)
                .await
                .unwrap_err();
            assert_eq!(err.reason_code(), "invalid_operation", "{:?}", position);
        }

        assert_eq!(store.subtree(kind, a.id).await.unwrap(), before);
        assert!(store.children(kind, b.id).await.unwrap().is_empty());
        assert!(store.validate(kind).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (store, _temp_dir) = create_test_store().await;
        let kind = HierarchyKind::Taxonomy;
        let id = Uuid::new_v4();

        store
            .insert(kind, NewNode::root(json!({})).with_id(id))
            .await
            .unwrap();
        let err = store
            .insert(kind, NewNode::root(json!({})).with_id(id))
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidOperation { .. }));

        // The same id is free in another kind
        store
            .insert(HierarchyKind::Media, NewNode::root(json!({})).with_id(id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_move_relative_to_itself_is_rejected() {
        let (store, _temp_dir) = create_test_store().await;
        let kind = HierarchyKind::Comment;
        let a = store.insert(kind, NewNode::root(json!({}))).await.unwrap();

        let err = store
            .move_node(kind, a.id, None, SiblingPosition::Before(a.id))
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn test_move_in_place_changes_nothing() {
        let (store, _temp_dir) = create_test_store().await;
        let kind = HierarchyKind::Organization;
        let a = store.insert(kind, NewNode::root(json!({}))).await.unwrap();
        let b = store.insert(kind, NewNode::root(json!({}))).await.unwrap();

        let moved = store
            .move_node(kind, b.id, None, SiblingPosition::Last)
            .await
            .unwrap();
        assert_eq!((moved.left, moved.right, moved.ordering), (3, 4, 1));
        assert_eq!(store.get(kind, a.id).await.unwrap().unwrap().left, 1);
    }

    #[test]
    fn test_lock_slots_are_distinct() {
        let mut slots: Vec<usize> = HierarchyKind::ALL.iter().map(|k| lock_slot(*k)).collect();
        slots.sort_unstable();
        slots.dedup();
        assert_eq!(slots.len(), HierarchyKind::ALL.len());
    }
}
