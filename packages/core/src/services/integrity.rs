//! Invariant checking and repair numbering
//!
//! Both functions work on an in-memory listing of one kind so they can run
//! inside a mutation transaction (post-condition check), from diagnostic
//! tooling, or in tests without a database.
//!
//! # Invariants checked
//!
//! - `left < right` and the width `right - left + 1` is even
//! - `(right - left - 1) / 2` equals the number of contained rows
//! - `parent_id` names the innermost containing node
//! - intervals are nested or disjoint, never partially overlapping
//! - roots have depth 0, children their parent's depth + 1
//! - boundaries form the contiguous sequence `1..=2n`
//! - sibling `ordering` is `0..k-1` in interval order

use crate::db::DbNumbering;
use crate::models::{InvariantViolation, Node, NodeId};
use std::collections::{HashMap, HashSet};

/// Check every invariant over all nodes of one kind
///
/// `nodes` may be in any order; they are sorted by `(left, id)` first, so the
/// result is deterministic for a given set of rows. An empty result means the
/// kind is consistent.
pub fn validate_nodes(nodes: &[Node]) -> Vec<InvariantViolation> {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.left.cmp(&b.left).then(a.id.cmp(&b.id)));

    let by_id: HashMap<NodeId, &Node> = sorted.iter().map(|n| (n.id, *n)).collect();
    let mut violations = Vec::new();

    for node in &sorted {
        if node.left >= node.right || (node.right - node.left) % 2 == 0 {
            violations.push(InvariantViolation::InvalidInterval {
                node_id: node.id,
                left: node.left,
                right: node.right,
            });
        }
    }

    for node in &sorted {
        if let Some(parent_id) = node.parent_id {
            if !by_id.contains_key(&parent_id) {
                violations.push(InvariantViolation::OrphanedNode {
                    node_id: node.id,
                    parent_id,
                });
            }
        }
    }

    // Sweep in left order with a stack of the intervals still open.
    let mut contained = vec![0i64; sorted.len()];
    let mut stack: Vec<usize> = Vec::new();
    for (i, node) in sorted.iter().enumerate() {
        while let Some(&top) = stack.last() {
            if sorted[top].right < node.left {
                stack.pop();
            } else {
                break;
            }
        }

        if let Some(&top) = stack.last() {
            if node.right > sorted[top].right {
                violations.push(InvariantViolation::OverlappingIntervals {
                    first: sorted[top].id,
                    second: node.id,
                });
            }
        }

        for &open in &stack {
            contained[open] += 1;
        }

        let containing = stack.last().map(|&top| sorted[top].id);
        let orphaned = node
            .parent_id
            .map(|p| !by_id.contains_key(&p))
            .unwrap_or(false);
        if !orphaned && node.parent_id != containing {
            violations.push(InvariantViolation::ParentMismatch {
                node_id: node.id,
                recorded: node.parent_id,
                containing,
            });
        }

        stack.push(i);
    }

    for (i, node) in sorted.iter().enumerate() {
        if node.left < node.right {
            let expected = (node.right - node.left - 1) / 2;
            if expected != contained[i] {
                violations.push(InvariantViolation::DescendantCountMismatch {
                    node_id: node.id,
                    expected,
                    actual: contained[i],
                });
            }
        }
    }

    for node in &sorted {
        let expected = match node.parent_id {
            None => Some(0),
            Some(parent_id) => by_id.get(&parent_id).map(|p| p.depth + 1),
        };
        if let Some(expected) = expected {
            if node.depth != expected {
                violations.push(InvariantViolation::DepthMismatch {
                    node_id: node.id,
                    expected,
                    actual: node.depth,
                });
            }
        }
    }

    let mut boundaries: Vec<i64> = sorted.iter().flat_map(|n| [n.left, n.right]).collect();
    boundaries.sort_unstable();
    if let Some((expected, found)) = boundaries
        .iter()
        .enumerate()
        .map(|(i, &b)| (i as i64 + 1, b))
        .find(|(expected, found)| expected != found)
    {
        violations.push(InvariantViolation::BoundaryGap { expected, found });
    }

    let mut next_rank: HashMap<Option<NodeId>, i64> = HashMap::new();
    for node in &sorted {
        let rank = next_rank.entry(node.parent_id).or_insert(0);
        if node.ordering != *rank {
            violations.push(InvariantViolation::OrderingMismatch {
                node_id: node.id,
                expected: *rank,
                actual: node.ordering,
            });
        }
        *rank += 1;
    }

    violations
}

/// Fresh numbering for a kind derived from its parent references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbering {
    /// One entry per node, in pre-order
    pub numbering: Vec<DbNumbering>,
    /// Nodes whose parent was missing and became roots
    pub orphans_promoted: usize,
}

/// Parent references form a cycle; `node_id` is one node on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentCycle {
    pub node_id: NodeId,
}

/// Recompute left/right/depth/ordering from `parent_id` adjacency
///
/// Siblings keep their relative order by `(ordering, left, id)`. A node whose
/// parent does not exist is promoted to a root.
pub fn renumber_forest(nodes: &[Node]) -> Result<Renumbering, ParentCycle> {
    let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();

    let mut orphans_promoted = 0;
    let mut children: HashMap<Option<NodeId>, Vec<&Node>> = HashMap::new();
    for node in nodes {
        let parent = match node.parent_id {
            Some(p) if ids.contains(&p) => Some(p),
            Some(_) => {
                orphans_promoted += 1;
                None
            }
            None => None,
        };
        children.entry(parent).or_default().push(node);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| {
            a.ordering
                .cmp(&b.ordering)
                .then(a.left.cmp(&b.left))
                .then(a.id.cmp(&b.id))
        });
    }

    let mut numbering = Vec::with_capacity(nodes.len());
    let mut counter = 1i64;

    // Open node: its sorted children, the next one to visit, its numbering slot
    struct Frame<'a> {
        children: &'a [&'a Node],
        next: usize,
        entry: usize,
    }

    let empty: Vec<&Node> = Vec::new();
    let roots = children.get(&None).unwrap_or(&empty);
    for (root_rank, root) in roots.iter().enumerate() {
        numbering.push(DbNumbering {
            id: root.id,
            parent_id: None,
            left: counter,
            right: 0,
            depth: 0,
            ordering: root_rank as i64,
        });
        counter += 1;
        let mut stack = vec![Frame {
            children: children.get(&Some(root.id)).map(Vec::as_slice).unwrap_or(&[]),
            next: 0,
            entry: numbering.len() - 1,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.children.len() {
                let child = frame.children[frame.next];
                let rank = frame.next as i64;
                frame.next += 1;
                let parent_entry = numbering[frame.entry];
                numbering.push(DbNumbering {
                    id: child.id,
                    parent_id: Some(parent_entry.id),
                    left: counter,
                    right: 0,
                    depth: parent_entry.depth + 1,
                    ordering: rank,
                });
                counter += 1;
                stack.push(Frame {
                    children: children.get(&Some(child.id)).map(Vec::as_slice).unwrap_or(&[]),
                    next: 0,
                    entry: numbering.len() - 1,
                });
            } else {
                numbering[frame.entry].right = counter;
                counter += 1;
                stack.pop();
            }
        }
    }

    if numbering.len() < nodes.len() {
        let reached: HashSet<NodeId> = numbering.iter().map(|n| n.id).collect();
        let node_id = nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| !reached.contains(id))
            .min()
            .unwrap_or_default();
        return Err(ParentCycle { node_id });
    }

    Ok(Renumbering {
        numbering,
        orphans_promoted,
    })
}
