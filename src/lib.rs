//! databind — optimistic-mutation engine for UI data bindings.
//!
//! Connects UI actions (add/edit/delete a row, run a flexible table
//! operation, call a remote procedure) to a remote relational backend
//! through a client-side cache. A mutation updates the cached view
//! immediately and speculatively while the real call runs, then reconciles
//! with the authoritative response — or rolls back on failure — without the
//! UI blocking.
//!
//! # Modules
//!
//! - [`types`] — rows, snapshots, mutation/operation kinds, filters.
//! - [`order`] — order specification and client-side row sorting.
//! - [`transform`] — the optimistic transforms and transform selection.
//! - [`validate`] — flexible-operation / remote-procedure settings checks.
//! - [`backend`] — the [`backend::Backend`] trait over the remote primitives.
//! - [`cache`] — the mutate-with-rollback primitive and [`cache::MemoryCache`].
//! - [`dispatch`] — mutation kind → (real mutation, optimistic transform).
//! - [`envelope`] — the uniform result envelope and summary phrases.
//! - [`coordinator`] — [`coordinator::MutationCoordinator`], the hub.

pub mod backend;
pub mod cache;
pub mod coordinator;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod order;
pub mod transform;
pub mod types;
pub mod validate;

pub use backend::{Backend, BackendError};
pub use cache::{MemoryCache, MutateOptions, MutationFuture, Refetch, SnapshotCache};
pub use coordinator::{ErrorCallback, MutationCoordinator, MutationSettings, SuccessCallback};
pub use envelope::{MutationEnvelope, MutationFailure, MutationStatus};
pub use error::{ConfigError, DatabindError, Result, TransformError};
pub use order::{OrderEntry, OrderInput, SortDirection};
pub use types::{
    BackendResponse, CachedSnapshot, CountMode, Filter, FilterOp, FlexibleOp, MutationKind,
    OptimisticOp,
};
