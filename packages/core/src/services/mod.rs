//! Hierarchy Services
//!
//! This module contains the structural hierarchy logic:
//!
//! - `HierarchyStore` - The trait every caller programs against
//! - `NestedSetStore` - libsql-backed implementation with atomic renumbering
//! - `integrity` - Invariant validation and repair numbering
//! - `HierarchyError` - Errors with stable reason codes
//!
//! Services coordinate between the database layer and application logic,
//! resolving and checking every referenced node before the range statements
//! run.

pub mod error;
pub mod hierarchy_store;
pub mod integrity;
pub mod nested_set_store;

pub use error::HierarchyError;
pub use hierarchy_store::HierarchyStore;
pub use integrity::{renumber_forest, validate_nodes, ParentCycle, Renumbering};
pub use nested_set_store::NestedSetStore;
