//! Mutation Operations
//!
//! Wrappers that drive `HierarchyStore` mutations with operational policy on
//! top of the store's own guarantees.
//!
//! - `MutationRetryQueue` - re-executes mutations that hit a busy database

pub mod retry_queue;

pub use retry_queue::MutationRetryQueue;
