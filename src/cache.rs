//! Cache collaborator — the mutate-with-optimistic-update-and-rollback
//! primitive, and an in-memory implementation of it.
//!
//! The cache owns the authoritative snapshot for one query and is the only
//! party that writes it. The coordinator never touches the snapshot directly;
//! it supplies a pure producer that the cache applies before the real
//! mutation settles and rolls back if the mutation fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    backend::BackendError,
    error::{Result, TransformError},
    types::{BackendResponse, CachedSnapshot},
};

// ============================================================================
// Mutate primitive types
// ============================================================================

/// The uniform shape of a prepared real mutation, regardless of which backend
/// primitive it wraps.
pub type MutationFuture =
    Pin<Box<dyn Future<Output = std::result::Result<BackendResponse, BackendError>> + Send>>;

/// Produces the optimistic snapshot from the cache's current one.
///
/// Pure — the cache passes the current snapshot in and stores whatever comes
/// back; a producer failure aborts the mutation before it starts.
pub type SnapshotProducer =
    Box<dyn FnOnce(Option<&CachedSnapshot>) -> std::result::Result<CachedSnapshot, TransformError> + Send>;

/// Options controlling one `mutate` call.
#[derive(Debug, Clone, Copy)]
pub struct MutateOptions {
    /// Store the mutation's response as the new snapshot. The coordinator
    /// disables this and relies on revalidation instead.
    pub populate_cache: bool,
    /// Refetch authoritative data after the mutation resolves.
    pub revalidate: bool,
    /// Restore the pre-optimistic snapshot if the mutation fails.
    pub rollback_on_error: bool,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            populate_cache: false,
            revalidate: true,
            rollback_on_error: true,
        }
    }
}

// ============================================================================
// SnapshotCache trait
// ============================================================================

/// A cache handle bound to one query key.
///
/// Implementations must serialize optimistic application and rollback for
/// their key — concurrent `mutate` calls on the same handle may interleave
/// their awaits, but snapshot reads and writes must be atomic.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Apply `optimistic` to the current snapshot, run `mutation`, then
    /// reconcile: roll back on failure, populate or revalidate on success.
    ///
    /// Returns the mutation's response, or `None` when the implementation
    /// has nothing to report beyond the revalidated snapshot.
    async fn mutate(
        &self,
        mutation: MutationFuture,
        optimistic: Option<SnapshotProducer>,
        opts: MutateOptions,
    ) -> Result<Option<BackendResponse>>;

    /// The current snapshot, if any.
    fn snapshot(&self) -> Option<CachedSnapshot>;
}

/// Fetches authoritative data for revalidation after a mutation resolves.
#[async_trait]
pub trait Refetch: Send + Sync {
    async fn fetch(&self) -> std::result::Result<CachedSnapshot, BackendError>;
}

// ============================================================================
// MemoryCache
// ============================================================================

/// In-memory [`SnapshotCache`] for a single query key.
pub struct MemoryCache {
    snapshot: Mutex<Option<CachedSnapshot>>,
    refetch: Option<Arc<dyn Refetch>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(None),
            refetch: None,
        }
    }

    pub fn with_snapshot(snapshot: CachedSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            refetch: None,
        }
    }

    /// Attach a revalidation fetcher, consulted when `opts.revalidate` is set.
    pub fn with_refetch(mut self, refetch: Arc<dyn Refetch>) -> Self {
        self.refetch = Some(refetch);
        self
    }

    pub fn set_snapshot(&self, snapshot: Option<CachedSnapshot>) {
        *self.snapshot.lock() = snapshot;
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn mutate(
        &self,
        mutation: MutationFuture,
        optimistic: Option<SnapshotProducer>,
        opts: MutateOptions,
    ) -> Result<Option<BackendResponse>> {
        let previous = self.snapshot.lock().clone();

        // Apply the speculative view before the real mutation settles. A
        // producer failure means invalid speculative input — the mutation is
        // never started.
        if let Some(producer) = optimistic {
            let next = producer(previous.as_ref())?;
            *self.snapshot.lock() = Some(next);
        }

        match mutation.await {
            Ok(response) => {
                if opts.populate_cache {
                    if let Some(rows) = response.data.as_ref().and_then(Value::as_array) {
                        *self.snapshot.lock() = Some(CachedSnapshot {
                            data: Some(rows.clone()),
                            count: response.count,
                        });
                    }
                }

                if opts.revalidate {
                    if let Some(refetch) = &self.refetch {
                        match refetch.fetch().await {
                            Ok(fresh) => *self.snapshot.lock() = Some(fresh),
                            // Keep the optimistic view — the next successful
                            // revalidation will converge it.
                            Err(e) => tracing::warn!(
                                error = %e,
                                "revalidation fetch failed after mutation"
                            ),
                        }
                    }
                }

                Ok(Some(response))
            }
            Err(e) => {
                if opts.rollback_on_error {
                    *self.snapshot.lock() = previous;
                }
                Err(e.into())
            }
        }
    }

    fn snapshot(&self) -> Option<CachedSnapshot> {
        self.snapshot.lock().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
