//! Mutation retry queue for transient storage contention
//!
//! This module wraps a `HierarchyStore` and re-executes structural mutations
//! that failed with a transient error (`SQLITE_BUSY` / `SQLITE_LOCKED`, e.g.
//! when another process holds the writer lock longer than the busy timeout).
//!
//! Every attempt starts from scratch: the failed attempt was rolled back, so
//! the next one re-reads the boundaries it needs. Non-transient errors
//! (not found, cyclic move, invariant violation, ...) are returned at once.
//!
//! # Example
//!
//! ```rust,no_run
//! use canopy_core::config::HierarchyConfig;
//! use canopy_core::models::{HierarchyKind, SiblingPosition};
//! use canopy_core::operations::MutationRetryQueue;
//! use canopy_core::services::NestedSetStore;
//! use std::sync::Arc;
//!
//! # async fn example(node_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let config = HierarchyConfig::from_env();
//! let store = Arc::new(NestedSetStore::open(config.clone()).await?);
//! let queue = MutationRetryQueue::from_config(store, &config);
//!
//! // Retries with exponential backoff (10ms, 20ms, 40ms)
//! queue
//!     .move_with_retry(HierarchyKind::Menu, node_id, None, SiblingPosition::First)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::HierarchyConfig;
use crate::models::{DeleteResult, HierarchyKind, NewNode, Node, NodeId, SiblingPosition};
use crate::services::{HierarchyError, HierarchyStore};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;

/// Re-executes mutations that failed on a busy or locked database
pub struct MutationRetryQueue {
    store: Arc<dyn HierarchyStore>,
    max_retries: usize,
    base_backoff: Duration,
}

impl MutationRetryQueue {
    /// Create a queue; `max_retries = 0` means a single attempt
    pub fn new(store: Arc<dyn HierarchyStore>, max_retries: usize, base_backoff: Duration) -> Self {
        Self {
            store,
            max_retries,
            base_backoff,
        }
    }

    pub fn from_config(store: Arc<dyn HierarchyStore>, config: &HierarchyConfig) -> Self {
        Self::new(store, config.max_retries, config.retry_base_delay())
    }

    /// Insert with retry; the id is fixed up front so a retried insert can
    /// never create a second node
    pub async fn insert_with_retry(
        &self,
        kind: HierarchyKind,
        node: NewNode,
    ) -> Result<Node, HierarchyError> {
        let node = match node.id {
            Some(_) => node,
            None => node.with_id(uuid::Uuid::new_v4()),
        };
        self.run("insert", kind, || self.store.insert(kind, node.clone()))
            .await
    }

    pub async fn move_with_retry(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        new_parent_id: Option<NodeId>,
        position: SiblingPosition,
    ) -> Result<Node, HierarchyError> {
        self.run("move", kind, || {
            self.store.move_node(kind, id, new_parent_id, position)
        })
        .await
    }

    pub async fn delete_with_retry(
        &self,
        kind: HierarchyKind,
        id: NodeId,
        cascade: bool,
    ) -> Result<DeleteResult, HierarchyError> {
        self.run("delete", kind, || self.store.delete(kind, id, cascade))
            .await
    }

    /// Delay before retry number `retries + 1`, saturating at `Duration::MAX`
    fn backoff_for(&self, retries: usize) -> Duration {
        self.base_backoff
            .checked_mul(1u32 << retries.min(16))
            .unwrap_or(Duration::MAX)
    }

    /// Drive `attempt` until it succeeds, fails permanently or the retry
    /// budget is spent
    ///
    /// # Retry Behavior
    ///
    /// - **Retry on**: errors where `HierarchyError::is_transient()` holds
    /// - **Backoff**: exponential from `base_backoff` (10ms, 20ms, 40ms, ...)
    /// - **Other errors**: fail immediately without retry
    async fn run<T, F, Fut>(
        &self,
        operation: &str,
        kind: HierarchyKind,
        attempt: F,
    ) -> Result<T, HierarchyError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, HierarchyError>>,
    {
        let mut retries = 0;

        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        tracing::debug!(
                            "{} on {} succeeded after {} retry(ies)",
                            operation,
                            kind,
                            retries
                        );
                    }
                    return Ok(value);
                }

                Err(e) if e.is_transient() && retries < self.max_retries => {
                    let backoff = self.backoff_for(retries);
                    tracing::debug!(
                        "Transient failure on attempt {}/{} of {} on {}: {}. Retrying in {:?}",
                        retries + 1,
                        self.max_retries + 1,
                        operation,
                        kind,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }

                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(
                            "Max retries ({}) exceeded for {} on {}",
                            self.max_retries,
                            operation,
                            kind
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
