//! Canopy Core Hierarchy Engine
//!
//! This crate maintains hierarchical entities (taxonomy terms, menu links,
//! organizations, comment threads, media folders) as nested sets, so subtree,
//! ancestor and path queries are single range scans instead of recursive walks.
//!
//! # Architecture
//!
//! - **Nested sets**: every node carries `left`/`right` boundaries, a depth and
//!   a dense sibling ordering, next to its `parent_id`
//! - **Table per kind**: each hierarchy kind is an independent numbering space
//! - **libsql/Turso**: embedded SQLite-compatible database, WAL mode
//! - **Atomic renumbering**: every mutation runs in one write transaction and
//!   can be re-validated before commit
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, HierarchyKind, InvariantViolation, ...)
//! - [`services`] - `HierarchyStore` trait, `NestedSetStore`, integrity checks
//! - [`operations`] - Retry wrapper for transient storage contention
//! - [`db`] - Database layer with libsql integration and interval arithmetic
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::HierarchyConfig;
pub use models::*;
pub use services::*;
