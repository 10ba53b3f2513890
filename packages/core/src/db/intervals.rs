//! Interval Arithmetic for Nested Sets
//!
//! Pure computations behind every structural mutation. The store resolves
//! nodes from the database, hands their boundaries to these functions and
//! turns the result into range `UPDATE` statements. Keeping the arithmetic
//! here means it can be tested without a database.
//!
//! # Gap Model
//!
//! Inserting at point `p` shifts every boundary `>= p` up by the inserted
//! width; removing a span `[l, r]` shifts every boundary `> r` down by the
//! span width. A move is a removal followed by an insertion, with the moved
//! span parked on negative values in between so the two shifts never touch it.

use crate::models::SiblingPosition;

/// Width of a freshly inserted leaf
pub const LEAF_WIDTH: i64 = 2;

/// Boundaries of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub left: i64,
    pub right: i64,
}

impl Span {
    pub fn new(left: i64, right: i64) -> Self {
        Self { left, right }
    }

    /// `right - left + 1`
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Whether boundary value `v` belongs to this span (inclusive)
    pub fn contains(&self, v: i64) -> bool {
        self.left <= v && v <= self.right
    }
}

/// A sibling position with its anchor resolved to boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Last,
    First,
    Before(Span),
    After(Span),
}

impl Placement {
    /// Resolve a caller position given the anchor sibling's span (if any)
    ///
    /// Returns `None` when the position names an anchor but none was supplied.
    pub fn resolve(position: &SiblingPosition, anchor: Option<Span>) -> Option<Self> {
        match position {
            SiblingPosition::Last => Some(Placement::Last),
            SiblingPosition::First => Some(Placement::First),
            SiblingPosition::Before(_) => anchor.map(Placement::Before),
            SiblingPosition::After(_) => anchor.map(Placement::After),
        }
    }
}

/// Boundary value where a new subtree's `left` will land
///
/// `parent` is `None` for the root set, in which case `max_right` (the largest
/// boundary in the kind, 0 when empty) bounds the append slot.
pub fn insertion_point(placement: Placement, parent: Option<Span>, max_right: i64) -> i64 {
    match placement {
        Placement::Last => match parent {
            Some(parent) => parent.right,
            None => max_right + 1,
        },
        Placement::First => match parent {
            Some(parent) => parent.left + 1,
            None => 1,
        },
        Placement::Before(sibling) => sibling.left,
        Placement::After(sibling) => sibling.right + 1,
    }
}

/// Renumbering steps for moving one subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    /// The subtree being moved, in pre-move coordinates
    pub span: Span,
    /// `span.width()`
    pub width: i64,
    /// Insertion point after the source gap has been closed
    pub target: i64,
    /// Added to every (un-negated) subtree boundary on re-insertion
    pub offset: i64,
    /// Added to every subtree depth
    pub depth_delta: i64,
}

impl MovePlan {
    /// Plan moving `span` to `insertion_point` (pre-move coordinates)
    ///
    /// Returns `None` if the insertion point lies inside the subtree itself,
    /// which would make the node its own ancestor.
    pub fn new(span: Span, insertion_point: i64, depth_delta: i64) -> Option<Self> {
        if span.left < insertion_point && insertion_point <= span.right {
            return None;
        }
        let width = span.width();
        let target = if insertion_point > span.right {
            insertion_point - width
        } else {
            insertion_point
        };
        Some(Self {
            span,
            width,
            target,
            offset: target - span.left,
            depth_delta,
        })
    }

    /// Whether the move leaves every boundary and depth untouched
    pub fn is_noop(&self) -> bool {
        self.offset == 0 && self.depth_delta == 0
    }

    /// Final value of a pre-move boundary once the plan is applied
    ///
    /// This is the closed form of the statement sequence the store executes
    /// (cut, close, open, re-insert).
    pub fn map_boundary(&self, v: i64) -> i64 {
        if self.span.contains(v) {
            return v + self.offset;
        }
        let closed = if v > self.span.right { v - self.width } else { v };
        if closed >= self.target {
            closed + self.width
        } else {
            closed
        }
    }
}
