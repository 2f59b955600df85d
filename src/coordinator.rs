//! MutationCoordinator — orchestrates one mutation lifecycle end-to-end.
//!
//! A `handle_mutation` call normalizes the speculative inputs, validates the
//! operation settings, resolves the (real mutation, optimistic transform)
//! pair, and hands both to the cache's mutate-with-rollback primitive.
//! Configuration bugs fail synchronously; backend failures are normalized
//! into an error envelope and reported through the error callback — they
//! never propagate as `Err` past this boundary.
//!
//! Concurrent `handle_mutation` calls are independent; serializing optimistic
//! application against a query key is the cache implementation's job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::{
    backend::Backend,
    cache::{MutateOptions, SnapshotCache, SnapshotProducer},
    dispatch::{self, PreparedMutation},
    envelope::MutationEnvelope,
    error::{ConfigError, Result},
    order::OrderEntry,
    transform::{self, OptimisticTransform, SpeculativeInput, TransformContext},
    types::{stamp_optimistic, CountMode, Filter, FlexibleOp, MutationKind, OptimisticOp},
    validate,
};

// ============================================================================
// Callbacks
// ============================================================================

/// Called once with the final envelope when a mutation succeeds.
pub type SuccessCallback = dyn Fn(&MutationEnvelope) + Send + Sync;

/// Called once with the error envelope when a mutation fails.
pub type ErrorCallback = dyn Fn(&MutationEnvelope) + Send + Sync;

// ============================================================================
// MutationSettings
// ============================================================================

/// Per-call configuration for `handle_mutation`.
pub struct MutationSettings {
    pub kind: MutationKind,
    /// Target table for row and flexible kinds.
    pub table: Option<String>,
    /// Column projection requested back from the backend.
    pub columns: Option<String>,
    /// Name of the unique-identifier field within a row.
    pub id_field: String,
    /// The data actually sent to the backend (row data, flexible payload, or
    /// procedure arguments).
    pub payload: Option<Value>,
    /// Row filters for the flexible kind.
    pub filters: Vec<Filter>,
    /// Procedure name for the remote-procedure kind.
    pub procedure: Option<String>,
    /// Operation kind for the flexible kind.
    pub flexible_operation: Option<FlexibleOp>,
    /// Requested optimistic behavior for flexible/remote-procedure kinds —
    /// raw host-tool value; an unset-then-cleared field arrives as `""`.
    pub optimistic_operation: Option<String>,
    /// Speculative row for the optimistic transform.
    pub optimistic_row: Option<Value>,
    /// Speculative full dataset (array), or a single implicit row (object).
    pub optimistic_data: Option<Value>,
    /// Speculative count for the replace transform.
    pub optimistic_count: Option<i64>,
    /// Request the server-confirmed row back after the mutation.
    pub return_record: bool,
    /// Resolve immediately with a pending envelope while the mutation keeps
    /// running in the background.
    pub return_immediately: bool,
    pub count_mode: CountMode,
    /// Active sort specification, used to re-sort after insert/edit.
    pub order_by: Vec<OrderEntry>,
    /// Free-form metadata echoed into every envelope.
    pub metadata: Option<Value>,
    pub on_success: Option<Arc<SuccessCallback>>,
    pub on_error: Option<Arc<ErrorCallback>>,
    /// Test-only: delay the real mutation by this many milliseconds.
    pub simulate_latency_ms: Option<u64>,
    /// Test-only: force the real mutation to fail.
    pub simulate_error: bool,
}

impl MutationSettings {
    pub fn new(kind: MutationKind) -> Self {
        Self {
            kind,
            table: None,
            columns: None,
            id_field: "id".to_string(),
            payload: None,
            filters: Vec::new(),
            procedure: None,
            flexible_operation: None,
            optimistic_operation: None,
            optimistic_row: None,
            optimistic_data: None,
            optimistic_count: None,
            return_record: false,
            return_immediately: false,
            count_mode: CountMode::Exact,
            order_by: Vec::new(),
            metadata: None,
            on_success: None,
            on_error: None,
            simulate_latency_ms: None,
            simulate_error: false,
        }
    }
}

// ============================================================================
// MutationCoordinator
// ============================================================================

#[derive(Clone)]
pub struct MutationCoordinator {
    backend: Arc<dyn Backend>,
    cache: Arc<dyn SnapshotCache>,
    mutating: Arc<AtomicBool>,
}

impl MutationCoordinator {
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<dyn SnapshotCache>) -> Self {
        Self {
            backend,
            cache,
            mutating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a mutation started by this coordinator is currently running.
    pub fn is_mutating(&self) -> bool {
        self.mutating.load(Ordering::SeqCst)
    }

    /// Override the mutation-in-progress flag.
    pub fn set_mutating(&self, value: bool) {
        self.mutating.store(value, Ordering::SeqCst);
    }

    /// Run one mutation lifecycle.
    ///
    /// Returns `Err` only for configuration and invalid-speculative-input
    /// bugs, synchronously. Backend failures resolve to an `Ok` envelope with
    /// `MutationStatus::Error`. With `return_immediately` set, resolves at
    /// once with a pending envelope while the mutation continues on the
    /// runtime; the callbacks still fire exactly once on settlement.
    pub async fn handle_mutation(&self, settings: MutationSettings) -> Result<MutationEnvelope> {
        let guard = MutatingGuard::engage(&self.mutating);

        // Host-tool quirk: a cleared optional field arrives as "" — normalize
        // once here instead of scattering empty-string checks below.
        let requested = OptimisticOp::parse(settings.optimistic_operation.as_deref())?;

        match settings.kind {
            MutationKind::FlexibleOperation => {
                validate::validate_flexible(
                    settings.table.as_deref(),
                    settings.flexible_operation,
                    settings.payload.as_ref(),
                    &settings.filters,
                )?;
            }
            MutationKind::RemoteProcedure => {
                validate::validate_procedure(settings.procedure.as_deref())?;
            }
            _ => {}
        }

        if has_input(&settings.optimistic_row) && has_input(&settings.optimistic_data) {
            return Err(ConfigError::ConflictingOptimisticInputs.into());
        }

        let input = materialize_speculative(&settings)?;
        let prepared = dispatch::prepare(&self.backend, &settings, requested, &input)?;

        // A delete-shaped transform needs a scalar identifier; check it now so
        // the call fails before any backend work starts.
        if prepared.transform == OptimisticTransform::Delete {
            if let Some(row) = input.row() {
                transform::require_scalar_id(row, &settings.id_field)?;
            }
        }

        let ctx = TransformContext {
            order_by: settings.order_by.clone(),
            id_field: settings.id_field.clone(),
            count_mode: settings.count_mode,
            speculative_count: settings.optimistic_count,
        };

        let job = MutationJob {
            cache: Arc::clone(&self.cache),
            prepared,
            input,
            ctx,
            kind: settings.kind,
            payload: settings.payload.clone(),
            metadata: settings.metadata.clone(),
            on_success: settings.on_success.clone(),
            on_error: settings.on_error.clone(),
        };

        if settings.return_immediately {
            let pending = MutationEnvelope::pending(
                settings.kind,
                settings.payload.clone(),
                job.input.as_value(),
                settings.optimistic_count,
                settings.metadata.clone(),
            );
            // The background continuation settles on its own; its callbacks
            // fire independently and the pending envelope returned here is
            // this call's only resolution.
            tokio::spawn(async move {
                let _guard = guard;
                let _ = settle(job).await;
            });
            return Ok(pending);
        }

        let envelope = settle(job).await;
        drop(guard);
        Ok(envelope)
    }
}

// ============================================================================
// Lifecycle internals
// ============================================================================

/// Everything one mutation needs to settle, detached from the coordinator so
/// it can continue on the runtime after an immediate return.
struct MutationJob {
    cache: Arc<dyn SnapshotCache>,
    prepared: PreparedMutation,
    input: SpeculativeInput,
    ctx: TransformContext,
    kind: MutationKind,
    payload: Option<Value>,
    metadata: Option<Value>,
    on_success: Option<Arc<SuccessCallback>>,
    on_error: Option<Arc<ErrorCallback>>,
}

/// Run the real mutation through the cache and resolve the final envelope.
async fn settle(job: MutationJob) -> MutationEnvelope {
    let optimistic_data = job.input.as_value();
    let optimistic_count = job.ctx.speculative_count;

    let producer: Option<SnapshotProducer> = match job.prepared.transform {
        OptimisticTransform::Identity => None,
        chosen => {
            let input = job.input.clone();
            let ctx = job.ctx.clone();
            Some(Box::new(move |current| {
                transform::apply(chosen, current, &input, &ctx)
            }))
        }
    };

    let result = job
        .cache
        .mutate(
            job.prepared.future,
            producer,
            MutateOptions {
                populate_cache: false,
                revalidate: true,
                rollback_on_error: true,
            },
        )
        .await;

    match result {
        Ok(response) => {
            let envelope = MutationEnvelope::success(
                job.kind,
                response,
                job.payload,
                optimistic_data,
                optimistic_count,
                job.metadata,
            );
            if let Some(callback) = &job.on_success {
                fire(callback, &envelope);
            }
            envelope
        }
        Err(e) => {
            let envelope = MutationEnvelope::failure(
                job.kind,
                e.to_string(),
                job.payload,
                optimistic_data,
                optimistic_count,
                job.metadata,
            );
            if let Some(callback) = &job.on_error {
                fire(callback, &envelope);
            }
            envelope
        }
    }
}

/// Invoke a user callback. Panics are swallowed — a misbehaving UI callback
/// must not break the mutation lifecycle.
fn fire(callback: &Arc<SuccessCallback>, envelope: &MutationEnvelope) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(envelope)));
}

fn has_input(value: &Option<Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

/// Materialize the final speculative input: stamp a fresh optimistic token
/// onto the explicit row, or onto a single-object dataset (an implicit row);
/// an array dataset is carried through unchanged.
fn materialize_speculative(settings: &MutationSettings) -> Result<SpeculativeInput> {
    if let Some(row) = &settings.optimistic_row {
        if !row.is_null() {
            return Ok(SpeculativeInput::Row(stamp_optimistic(row.clone())));
        }
    }

    match &settings.optimistic_data {
        None | Some(Value::Null) => Ok(SpeculativeInput::None),
        Some(Value::Array(rows)) => Ok(SpeculativeInput::Dataset(rows.clone())),
        Some(row @ Value::Object(_)) => Ok(SpeculativeInput::Row(stamp_optimistic(row.clone()))),
        Some(_) => Err(ConfigError::InvalidSpeculativeDataset.into()),
    }
}

/// Holds the mutation-in-progress flag true for exactly the lifetime of one
/// mutation, on every exit path.
struct MutatingGuard(Arc<AtomicBool>);

impl MutatingGuard {
    fn engage(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for MutatingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OPTIMISTIC_FLAG_FIELD, OPTIMISTIC_ID_FIELD};
    use serde_json::json;

    fn settings_with_row(row: Value) -> MutationSettings {
        let mut settings = MutationSettings::new(MutationKind::Insert);
        settings.optimistic_row = Some(row);
        settings
    }

    #[test]
    fn materialize_stamps_explicit_row() {
        let input = materialize_speculative(&settings_with_row(json!({"name": "Bob"}))).unwrap();
        let row = input.row().unwrap();
        assert_eq!(row[OPTIMISTIC_FLAG_FIELD], json!(true));
        assert!(row[OPTIMISTIC_ID_FIELD].is_string());
    }

    #[test]
    fn materialize_treats_object_dataset_as_implicit_row() {
        let mut settings = MutationSettings::new(MutationKind::FlexibleOperation);
        settings.optimistic_data = Some(json!({"name": "Bob"}));
        let input = materialize_speculative(&settings).unwrap();
        let row = input.row().unwrap();
        assert_eq!(row["name"], json!("Bob"));
        assert_eq!(row[OPTIMISTIC_FLAG_FIELD], json!(true));
    }

    #[test]
    fn materialize_carries_array_dataset_unchanged() {
        let mut settings = MutationSettings::new(MutationKind::FlexibleOperation);
        settings.optimistic_data = Some(json!([{"id": 1}, {"id": 2}]));
        let input = materialize_speculative(&settings).unwrap();
        let rows = input.dataset().unwrap();
        assert_eq!(rows.len(), 2);
        // No stamping on dataset rows.
        assert!(rows[0].get(OPTIMISTIC_ID_FIELD).is_none());
    }

    #[test]
    fn materialize_rejects_scalar_dataset() {
        let mut settings = MutationSettings::new(MutationKind::FlexibleOperation);
        settings.optimistic_data = Some(json!(42));
        let err = materialize_speculative(&settings).unwrap_err();
        assert!(matches!(
            err,
            crate::error::DatabindError::Config(ConfigError::InvalidSpeculativeDataset)
        ));
    }

    #[test]
    fn materialize_null_inputs_are_absent() {
        let mut settings = MutationSettings::new(MutationKind::Insert);
        settings.optimistic_row = Some(Value::Null);
        settings.optimistic_data = Some(Value::Null);
        assert_eq!(
            materialize_speculative(&settings).unwrap(),
            SpeculativeInput::None
        );
    }

    #[test]
    fn mutating_guard_resets_flag_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let _guard = MutatingGuard::engage(&flag);
            assert!(flag.load(Ordering::SeqCst));
        }
        assert!(!flag.load(Ordering::SeqCst));
    }
}
