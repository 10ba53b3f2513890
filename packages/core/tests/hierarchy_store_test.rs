//! HierarchyStore Integration Tests
//!
//! Exercises insert/delete/move and every query against a real libsql
//! database, checking exact numbering for the reference scenarios and the
//! global invariants after each mutation.

#[cfg(test)]
mod hierarchy_store_tests {
    use anyhow::Result;
    use canopy_core::config::HierarchyConfig;
    use canopy_core::models::{HierarchyKind, NewNode, Node, NodeId, SiblingPosition};
    use canopy_core::services::{HierarchyError, HierarchyStore, NestedSetStore};
    use serde_json::json;
    use tempfile::TempDir;

    const KIND: HierarchyKind = HierarchyKind::Taxonomy;

    /// Helper to create test store
    async fn create_test_store() -> Result<(NestedSetStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let config = HierarchyConfig::with_database_path(temp_dir.path().join("test.db"));
        let store = NestedSetStore::open(config).await?;
        Ok((store, temp_dir))
    }

    async fn root(store: &NestedSetStore, name: &str) -> Result<Node> {
        Ok(store.insert(KIND, NewNode::root(json!({ "name": name }))).await?)
    }

    async fn child(store: &NestedSetStore, parent: NodeId, name: &str) -> Result<Node> {
        Ok(store
            .insert(KIND, NewNode::child_of(parent, json!({ "name": name })))
            .await?)
    }

    /// (left, right, depth) of a node as currently stored
    async fn numbering(store: &NestedSetStore, id: NodeId) -> Result<(i64, i64, i64)> {
        let node = store.get(KIND, id).await?.expect("node should exist");
        Ok((node.left, node.right, node.depth))
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes
            .iter()
            .map(|n| n.attributes["name"].as_str().unwrap_or_default())
            .collect()
    }

    async fn assert_valid(store: &NestedSetStore) -> Result<()> {
        let violations = store.validate(KIND).await?;
        assert!(violations.is_empty(), "violations: {:?}", violations);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_scenario() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let a = root(&store, "A").await?;
        assert_eq!((a.left, a.right, a.depth), (1, 2, 0));

        let b = child(&store, a.id, "B").await?;
        assert_eq!(numbering(&store, a.id).await?, (1, 4, 0));
        assert_eq!((b.left, b.right, b.depth), (2, 3, 1));

        let c = store
            .insert(
                KIND,
                NewNode::child_of(a.id, json!({"name": "C"}))
                    .with_position(SiblingPosition::After(b.id)),
            )
            .await?;
        assert_eq!(numbering(&store, a.id).await?, (1, 6, 0));
        assert_eq!(numbering(&store, b.id).await?, (2, 3, 1));
        assert_eq!((c.left, c.right, c.depth), (4, 5, 1));
        assert_eq!(c.ordering, 1);

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_delete_scenario() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = child(&store, a.id, "B").await?;
        let c = child(&store, a.id, "C").await?;

        let result = store.delete(KIND, b.id, false).await?;
        assert_eq!(result.removed, 1);
        assert_eq!(numbering(&store, a.id).await?, (1, 4, 0));
        assert_eq!(numbering(&store, c.id).await?, (2, 3, 1));
        assert_eq!(store.get(KIND, c.id).await?.map(|n| n.ordering), Some(0));
        assert!(store.get(KIND, b.id).await?.is_none());

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_move_subtree_scenario() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = child(&store, a.id, "B").await?;
        let c = root(&store, "C").await?;
        let d = child(&store, c.id, "D").await?;
        let e = child(&store, c.id, "E").await?;

        let b_before = numbering(&store, b.id).await?;
        let a_before = numbering(&store, a.id).await?;
        let depths_before = [
            numbering(&store, c.id).await?.2,
            numbering(&store, d.id).await?.2,
            numbering(&store, e.id).await?.2,
        ];

        let moved = store
            .move_node(KIND, c.id, Some(b.id), SiblingPosition::Last)
            .await?;
        assert_eq!(moved.parent_id, Some(b.id));

        let width = 2 * (1 + 2);
        assert_eq!(numbering(&store, b.id).await?.1, b_before.1 + width);
        assert_eq!(numbering(&store, a.id).await?.1, a_before.1 + width);

        let depths_after = [
            numbering(&store, c.id).await?.2,
            numbering(&store, d.id).await?.2,
            numbering(&store, e.id).await?.2,
        ];
        for (before, after) in depths_before.iter().zip(depths_after.iter()) {
            assert_eq!(*after, before + 1);
        }

        assert_eq!(numbering(&store, c.id).await?, (3, 8, 2));
        assert_eq!(numbering(&store, d.id).await?, (4, 5, 3));
        assert_eq!(numbering(&store, e.id).await?, (6, 7, 3));
        assert_eq!(names(&store.roots(KIND).await?), vec!["A"]);

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_cyclic_move_is_rejected_and_tree_unchanged() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = child(&store, a.id, "B").await?;
        let c = child(&store, b.id, "C").await?;
        let before = store.subtree(KIND, a.id).await?;

        for target in [a.id, b.id, c.id] {
            let err = store
                .move_node(KIND, a.id, Some(target), SiblingPosition::Last)
                .await
                .unwrap_err();
            assert!(
                matches!(err, HierarchyError::CyclicMove { node_id, target_parent_id }
                    if node_id == a.id && target_parent_id == target),
                "unexpected error: {:?}",
                err
            );
        }

        let err = store
            .move_node(KIND, b.id, Some(c.id), SiblingPosition::First)
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "cyclic_move");

        assert_eq!(store.subtree(KIND, a.id).await?, before);
        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_sibling_positions() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let p = root(&store, "P").await?;
        let b = child(&store, p.id, "B").await?;

        let parent_id = p.id;
        let insert_at = |name: &'static str, position: SiblingPosition| {
            let store = store.clone();
            async move {
                store
                    .insert(
                        KIND,
                        NewNode::child_of(parent_id, json!({ "name": name }))
                            .with_position(position),
                    )
                    .await
            }
        };

        insert_at("A", SiblingPosition::First).await?;
        let d = insert_at("D", SiblingPosition::Last).await?;
        insert_at("C", SiblingPosition::Before(d.id)).await?;
        insert_at("BB", SiblingPosition::After(b.id)).await?;

        let children = store.children(KIND, p.id).await?;
        assert_eq!(names(&children), vec!["A", "B", "BB", "C", "D"]);
        let orderings: Vec<i64> = children.iter().map(|n| n.ordering).collect();
        assert_eq!(orderings, vec![0, 1, 2, 3, 4]);

        // Root-level First
        root(&store, "Z").await?;
        store
            .insert(
                KIND,
                NewNode::root(json!({"name": "Y"})).with_position(SiblingPosition::First),
            )
            .await?;
        assert_eq!(names(&store.roots(KIND).await?), vec!["Y", "P", "Z"]);

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_queries() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = child(&store, a.id, "B").await?;
        let c = child(&store, a.id, "C").await?;
        let d = child(&store, c.id, "D").await?;
        let e = child(&store, d.id, "E").await?;
        root(&store, "F").await?;

        assert_eq!(names(&store.descendants(KIND, a.id).await?), vec!["B", "C", "D", "E"]);
        assert_eq!(names(&store.ancestors(KIND, e.id).await?), vec!["A", "C", "D"]);
        assert_eq!(names(&store.path_to_root(KIND, e.id).await?), vec!["A", "C", "D", "E"]);
        assert_eq!(names(&store.subtree(KIND, c.id).await?), vec!["C", "D", "E"]);
        assert_eq!(names(&store.siblings(KIND, b.id).await?), vec!["C"]);
        assert_eq!(names(&store.siblings(KIND, a.id).await?), vec!["F"]);
        assert_eq!(names(&store.children(KIND, a.id).await?), vec!["B", "C"]);
        assert_eq!(names(&store.roots(KIND).await?), vec!["A", "F"]);
        assert_eq!(store.parent(KIND, d.id).await?.map(|n| n.id), Some(c.id));
        assert_eq!(store.parent(KIND, a.id).await?, None);
        assert_eq!(store.count(KIND).await?, 6);
        assert!(store.ancestors(KIND, a.id).await?.is_empty());
        assert!(store.descendants(KIND, b.id).await?.is_empty());

        let tree = store.tree(KIND, a.id).await?;
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[1].children[0].children[0].node.id, e.id);

        // Round-trip: the topmost ancestor's descendants include the node
        let top = store.ancestors(KIND, e.id).await?[0].id;
        assert!(store
            .descendants(KIND, top)
            .await?
            .iter()
            .any(|n| n.id == e.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_nodes_fail_with_not_found() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let missing = uuid::Uuid::new_v4();

        assert!(store.get(KIND, missing).await?.is_none());
        for err in [
            store.children(KIND, missing).await.unwrap_err(),
            store.descendants(KIND, missing).await.unwrap_err(),
            store.ancestors(KIND, missing).await.unwrap_err(),
            store.siblings(KIND, missing).await.unwrap_err(),
            store.path_to_root(KIND, missing).await.unwrap_err(),
            store.subtree(KIND, missing).await.unwrap_err(),
            store.tree(KIND, missing).await.unwrap_err(),
            store.parent(KIND, missing).await.unwrap_err(),
            store.delete(KIND, missing, true).await.unwrap_err(),
            store
                .move_node(KIND, missing, None, SiblingPosition::Last)
                .await
                .unwrap_err(),
            store
                .move_node(KIND, a.id, Some(missing), SiblingPosition::Last)
                .await
                .unwrap_err(),
            store
                .insert(KIND, NewNode::child_of(missing, json!({})))
                .await
                .unwrap_err(),
            store
                .insert(
                    KIND,
                    NewNode::root(json!({})).with_position(SiblingPosition::Before(missing)),
                )
                .await
                .unwrap_err(),
        ] {
            assert_eq!(err.reason_code(), "not_found", "unexpected error: {:?}", err);
        }

        assert_eq!(store.count(KIND).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_requires_cascade_for_subtrees() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = child(&store, a.id, "B").await?;
        child(&store, b.id, "C").await?;
        let d = root(&store, "D").await?;

        let err = store.delete(KIND, b.id, false).await.unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidOperation { .. }));
        assert_eq!(store.count(KIND).await?, 4);

        let result = store.delete(KIND, b.id, true).await?;
        assert_eq!(result.removed, 2);
        assert_eq!(numbering(&store, a.id).await?, (1, 2, 0));
        assert_eq!(numbering(&store, d.id).await?, (3, 4, 0));

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_move_reorders_within_parent() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let p = root(&store, "P").await?;
        let a = child(&store, p.id, "A").await?;
        child(&store, p.id, "B").await?;
        let c = child(&store, p.id, "C").await?;

        store
            .move_node(KIND, c.id, Some(p.id), SiblingPosition::Before(a.id))
            .await?;
        assert_eq!(names(&store.children(KIND, p.id).await?), vec!["C", "A", "B"]);

        store
            .move_node(KIND, c.id, Some(p.id), SiblingPosition::Last)
            .await?;
        assert_eq!(names(&store.children(KIND, p.id).await?), vec!["A", "B", "C"]);

        // Promote to root, then back under P as first child
        let promoted = store
            .move_node(KIND, a.id, None, SiblingPosition::Last)
            .await?;
        assert_eq!((promoted.depth, promoted.parent_id), (0, None));
        assert_eq!(names(&store.roots(KIND).await?), vec!["P", "A"]);
        assert_eq!(names(&store.children(KIND, p.id).await?), vec!["B", "C"]);

        store
            .move_node(KIND, a.id, Some(p.id), SiblingPosition::First)
            .await?;
        let children = store.children(KIND, p.id).await?;
        assert_eq!(names(&children), vec!["A", "B", "C"]);
        assert!(children.iter().enumerate().all(|(i, n)| n.ordering == i as i64));

        assert_valid(&store).await
    }

    #[tokio::test]
    async fn test_kinds_are_independent() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let menu = store
            .insert(HierarchyKind::Menu, NewNode::root(json!({"name": "Main"})))
            .await?;
        store
            .insert(HierarchyKind::Menu, NewNode::child_of(menu.id, json!({})))
            .await?;

        let term = root(&store, "Term").await?;
        assert_eq!((term.left, term.right), (1, 2));

        // A menu id is unknown to the taxonomy
        let err = store
            .insert(KIND, NewNode::child_of(menu.id, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::NotFound { kind: HierarchyKind::Taxonomy, .. }));

        store.delete(HierarchyKind::Menu, menu.id, true).await?;
        assert_eq!(store.count(HierarchyKind::Menu).await?, 0);
        assert_eq!(numbering(&store, term.id).await?, (1, 2, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_attributes_are_preserved_through_moves() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let a = root(&store, "A").await?;
        let b = store
            .insert(
                KIND,
                NewNode::root(json!({"name": "B", "slug": "b", "weight": 3})),
            )
            .await?;

        let moved = store
            .move_node(KIND, b.id, Some(a.id), SiblingPosition::Last)
            .await?;
        assert_eq!(moved.attributes, json!({"name": "B", "slug": "b", "weight": 3}));
        assert_eq!(moved.created_at, b.created_at);
        Ok(())
    }
}
