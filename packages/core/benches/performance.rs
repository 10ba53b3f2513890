//! Performance benchmarks for Canopy core operations
//!
//! Run with: `cargo bench -p canopy-core`
//!
//! These benchmarks measure critical path performance:
//! - Leaf insertion (gap opening on a growing kind)
//! - Subtree moves (park, close, open, restore)
//! - Subtree reads (single range scan)
//! - Full-kind validation and rebuild numbering (in memory)

use canopy_core::config::HierarchyConfig;
use canopy_core::models::{HierarchyKind, NewNode, Node, NodeId, SiblingPosition};
use canopy_core::services::{
    renumber_forest, validate_nodes, HierarchyStore, NestedSetStore,
};
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use uuid::Uuid;

const KIND: HierarchyKind = HierarchyKind::Taxonomy;

/// Setup a store with a fresh database
async fn setup_test_store() -> (NestedSetStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = HierarchyConfig::with_database_path(temp_dir.path().join("bench.db"));
    let store = NestedSetStore::open(config).await.unwrap();
    (store, temp_dir)
}

/// Insert a balanced tree of `fanout^1 + ... + fanout^levels` nodes under one root
async fn seed_tree(store: &NestedSetStore, fanout: usize, levels: usize) -> Vec<NodeId> {
    let root = store.insert(KIND, NewNode::root(json!({}))).await.unwrap();
    let mut frontier = vec![root.id];
    let mut all = vec![root.id];
    for _ in 0..levels {
        let mut next = Vec::new();
        for parent in &frontier {
            for _ in 0..fanout {
                let node = store
                    .insert(KIND, NewNode::child_of(*parent, json!({})))
                    .await
                    .unwrap();
                next.push(node.id);
            }
        }
        all.extend(&next);
        frontier = next;
    }
    all
}

/// Generate an in-memory forest in the shape `renumber_forest` expects
fn generate_forest(size: usize) -> Vec<Node> {
    let ids: Vec<Uuid> = (0..size).map(|i| Uuid::from_u128(i as u128 + 1)).collect();
    let raw: Vec<Node> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| Node {
            id: *id,
            kind: KIND,
            parent_id: if i % 50 == 0 { None } else { Some(ids[i / 3]) },
            left: 0,
            right: 0,
            depth: 0,
            ordering: i as i64,
            attributes: json!({}),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        })
        .collect();

    let renumbering = renumber_forest(&raw).unwrap();
    let mut nodes = raw;
    let index: std::collections::HashMap<Uuid, usize> =
        nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
    for entry in renumbering.numbering {
        let node = &mut nodes[index[&entry.id]];
        node.parent_id = entry.parent_id;
        node.left = entry.left;
        node.right = entry.right;
        node.depth = entry.depth;
        node.ordering = entry.ordering;
    }
    nodes
}

/// Benchmark leaf insertion into a kind that already holds ~150 nodes
///
/// Every insert shifts the boundaries to its right, so appending under the
/// first child of the root is close to the worst case.
fn bench_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("insert_leaf", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (store, _temp) = setup_test_store().await;
                let ids = seed_tree(&store, 5, 3).await;
                let parent = ids[1];

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(
                        store
                            .insert(KIND, NewNode::child_of(parent, json!({})))
                            .await
                            .unwrap(),
                    );
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark moving a 31-node subtree back and forth between two parents
fn bench_move_subtree(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("move_subtree", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (store, _temp) = setup_test_store().await;
                let ids = seed_tree(&store, 5, 3).await;
                let (subject, first, second) = (ids[1], ids[0], ids[5]);

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let target = if i % 2 == 0 { second } else { first };
                    black_box(
                        store
                            .move_node(KIND, subject, Some(target), SiblingPosition::Last)
                            .await
                            .unwrap(),
                    );
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark subtree and ancestor reads (one range scan each)
fn bench_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (store, _temp) = rt.block_on(setup_test_store());
    let ids = rt.block_on(seed_tree(&store, 5, 3));
    let leaf = *ids.last().unwrap();

    let mut group = c.benchmark_group("reads");
    group.bench_function("subtree_root", |b| {
        b.iter(|| rt.block_on(async { black_box(store.subtree(KIND, ids[0]).await.unwrap()) }))
    });
    group.bench_function("path_to_root_leaf", |b| {
        b.iter(|| rt.block_on(async { black_box(store.path_to_root(KIND, leaf).await.unwrap()) }))
    });
    group.finish();
}

/// Benchmark in-memory validation and rebuild numbering of 10k nodes
fn bench_integrity(c: &mut Criterion) {
    let forest = generate_forest(10_000);

    let mut group = c.benchmark_group("integrity");
    group.sample_size(20);
    group.bench_function("validate_10k", |b| {
        b.iter(|| black_box(validate_nodes(black_box(&forest))))
    });
    group.bench_function("renumber_10k", |b| {
        b.iter(|| black_box(renumber_forest(black_box(&forest)).unwrap()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_move_subtree,
    bench_reads,
    bench_integrity
);
criterion_main!(benches);
