//! Mutation dispatch — maps a mutation kind to the real backend call and the
//! optimistic transform to pair with it.
//!
//! The two calling conventions (row-oriented and filter/procedure-oriented)
//! are folded into the single [`MutationFuture`] shape here, by capturing the
//! operation-specific settings in a wrapper closure.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::{
    backend::{Backend, BackendError},
    cache::MutationFuture,
    coordinator::MutationSettings,
    error::{ConfigError, Result},
    transform::{self, OptimisticTransform, SpeculativeInput},
    types::{MutationKind, OptimisticOp},
    validate,
};

/// A mutation ready to hand to the cache: the real call and the optimistic
/// transform chosen for it.
pub struct PreparedMutation {
    pub future: MutationFuture,
    pub transform: OptimisticTransform,
}

impl std::fmt::Debug for PreparedMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedMutation")
            .field("future", &"<future>")
            .field("transform", &self.transform)
            .finish()
    }
}

/// Resolve `(real mutation, optimistic transform)` for one call.
///
/// Row kinds default to their matching transform when a speculative row is
/// present; flexible and remote-procedure kinds use the independently
/// requested optimistic operation. Missing required settings fail with a
/// [`ConfigError`] before any future is built.
pub fn prepare(
    backend: &Arc<dyn Backend>,
    settings: &MutationSettings,
    requested: Option<OptimisticOp>,
    input: &SpeculativeInput,
) -> Result<PreparedMutation> {
    let transform = match settings.kind {
        MutationKind::Insert => row_transform(OptimisticTransform::Insert, input),
        MutationKind::Update => row_transform(OptimisticTransform::Edit, input),
        MutationKind::Delete => row_transform(OptimisticTransform::Delete, input),
        MutationKind::FlexibleOperation | MutationKind::RemoteProcedure => transform::choose(
            requested,
            input.row().is_some(),
            input.dataset().is_some(),
        ),
    };

    let future: MutationFuture = match settings.kind {
        MutationKind::Insert => {
            let (backend, table, columns, id_field, payload) = row_parts(backend, settings)?;
            Box::pin(async move {
                backend
                    .insert_row(&table, columns.as_deref(), &id_field, &payload)
                    .await
            })
        }
        MutationKind::Update => {
            let (backend, table, columns, id_field, payload) = row_parts(backend, settings)?;
            Box::pin(async move {
                backend
                    .update_row(&table, columns.as_deref(), &id_field, &payload)
                    .await
            })
        }
        MutationKind::Delete => {
            let (backend, table, columns, id_field, payload) = row_parts(backend, settings)?;
            Box::pin(async move {
                backend
                    .delete_row(&table, columns.as_deref(), &id_field, &payload)
                    .await
            })
        }
        MutationKind::FlexibleOperation => {
            let op = validate::validate_flexible(
                settings.table.as_deref(),
                settings.flexible_operation,
                settings.payload.as_ref(),
                &settings.filters,
            )?;
            let backend = Arc::clone(backend);
            let table = settings.table.clone().unwrap_or_default();
            let payload = settings.payload.clone();
            let filters = settings.filters.clone();
            let return_record = settings.return_record;
            Box::pin(async move {
                backend
                    .run_flexible_operation(&table, op, payload.as_ref(), &filters, return_record)
                    .await
            })
        }
        MutationKind::RemoteProcedure => {
            let name = validate::validate_procedure(settings.procedure.as_deref())?;
            let backend = Arc::clone(backend);
            let args = settings.payload.clone();
            Box::pin(async move { backend.run_remote_procedure(&name, args.as_ref()).await })
        }
    };

    Ok(PreparedMutation {
        future: simulated(future, settings.simulate_latency_ms, settings.simulate_error),
        transform,
    })
}

fn row_transform(transform: OptimisticTransform, input: &SpeculativeInput) -> OptimisticTransform {
    if input.row().is_some() {
        transform
    } else {
        OptimisticTransform::Identity
    }
}

type RowParts = (Arc<dyn Backend>, String, Option<String>, String, Value);

fn row_parts(backend: &Arc<dyn Backend>, settings: &MutationSettings) -> Result<RowParts> {
    let table = settings
        .table
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ConfigError::MissingTableName)?
        .to_string();

    Ok((
        Arc::clone(backend),
        table,
        settings.columns.clone(),
        settings.id_field.clone(),
        settings.payload.clone().unwrap_or(Value::Null),
    ))
}

/// Wrap the real mutation with the test-only latency/error injection flags.
fn simulated(future: MutationFuture, latency_ms: Option<u64>, fail: bool) -> MutationFuture {
    if latency_ms.is_none() && !fail {
        return future;
    }
    Box::pin(async move {
        if let Some(ms) = latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if fail {
            return Err(BackendError::new("Simulated mutation failure"));
        }
        future.await
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabindError;
    use crate::types::{BackendResponse, Filter, FilterOp, FlexibleOp};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopBackend;

    #[async_trait]
    impl Backend for NoopBackend {
        async fn insert_row(
            &self,
            _table: &str,
            _columns: Option<&str>,
            _id_field: &str,
            _payload: &Value,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::default())
        }

        async fn update_row(
            &self,
            _table: &str,
            _columns: Option<&str>,
            _id_field: &str,
            _payload: &Value,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::default())
        }

        async fn delete_row(
            &self,
            _table: &str,
            _columns: Option<&str>,
            _id_field: &str,
            _payload: &Value,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::default())
        }

        async fn run_flexible_operation(
            &self,
            _table: &str,
            _operation: FlexibleOp,
            _payload: Option<&Value>,
            _filters: &[Filter],
            _return_record: bool,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::default())
        }

        async fn run_remote_procedure(
            &self,
            _procedure: &str,
            _args: Option<&Value>,
        ) -> std::result::Result<BackendResponse, BackendError> {
            Ok(BackendResponse::default())
        }
    }

    fn noop_backend() -> Arc<dyn Backend> {
        Arc::new(NoopBackend)
    }

    fn row_settings(kind: MutationKind) -> MutationSettings {
        let mut settings = MutationSettings::new(kind);
        settings.table = Some("tasks".to_string());
        settings.payload = Some(json!({"id": 1}));
        settings
    }

    #[test]
    fn row_kinds_pair_with_matching_transform_when_row_present() {
        let backend = noop_backend();
        let input = SpeculativeInput::Row(json!({"id": 1}));

        for (kind, expected) in [
            (MutationKind::Insert, OptimisticTransform::Insert),
            (MutationKind::Update, OptimisticTransform::Edit),
            (MutationKind::Delete, OptimisticTransform::Delete),
        ] {
            let prepared = prepare(&backend, &row_settings(kind), None, &input).unwrap();
            assert_eq!(prepared.transform, expected);
        }
    }

    #[test]
    fn row_kinds_fall_back_to_identity_without_a_row() {
        let backend = noop_backend();
        let prepared = prepare(
            &backend,
            &row_settings(MutationKind::Insert),
            None,
            &SpeculativeInput::None,
        )
        .unwrap();
        assert_eq!(prepared.transform, OptimisticTransform::Identity);
    }

    #[test]
    fn row_kinds_require_a_table() {
        let backend = noop_backend();
        let mut settings = row_settings(MutationKind::Update);
        settings.table = None;
        let err = prepare(&backend, &settings, None, &SpeculativeInput::None).unwrap_err();
        assert!(matches!(
            err,
            DatabindError::Config(ConfigError::MissingTableName)
        ));
    }

    #[test]
    fn flexible_kind_resolves_requested_optimistic_operation() {
        let backend = noop_backend();
        let mut settings = MutationSettings::new(MutationKind::FlexibleOperation);
        settings.table = Some("tasks".to_string());
        settings.flexible_operation = Some(FlexibleOp::Upsert);
        settings.payload = Some(json!({"id": 1, "done": true}));

        // An upsert can request edit-row optimistics.
        let input = SpeculativeInput::Row(json!({"id": 1, "done": true}));
        let prepared = prepare(&backend, &settings, Some(OptimisticOp::EditRow), &input).unwrap();
        assert_eq!(prepared.transform, OptimisticTransform::Edit);

        // With no requested operation the transform is identity.
        let prepared = prepare(&backend, &settings, None, &input).unwrap();
        assert_eq!(prepared.transform, OptimisticTransform::Identity);
    }

    #[test]
    fn remote_procedure_requires_a_name() {
        let backend = noop_backend();
        let settings = MutationSettings::new(MutationKind::RemoteProcedure);
        let err = prepare(&backend, &settings, None, &SpeculativeInput::None).unwrap_err();
        assert!(matches!(
            err,
            DatabindError::Config(ConfigError::MissingProcedureName)
        ));
    }

    #[tokio::test]
    async fn simulated_error_flag_forces_failure() {
        let backend = noop_backend();
        let mut settings = row_settings(MutationKind::Insert);
        settings.simulate_error = true;

        let prepared = prepare(&backend, &settings, None, &SpeculativeInput::None).unwrap();
        let err = prepared.future.await.unwrap_err();
        assert!(err.message.contains("Simulated"));
    }

    #[test]
    fn flexible_filter_settings_validated_before_dispatch() {
        let backend = noop_backend();
        let mut settings = MutationSettings::new(MutationKind::FlexibleOperation);
        settings.table = Some("tasks".to_string());
        settings.flexible_operation = Some(FlexibleOp::Delete);
        // Delete without filters is a caller bug.
        let err = prepare(&backend, &settings, None, &SpeculativeInput::None).unwrap_err();
        assert!(matches!(
            err,
            DatabindError::Config(ConfigError::MissingFilters { .. })
        ));

        settings.filters = vec![Filter {
            column: "id".to_string(),
            op: FilterOp::Eq,
            value: json!(1),
        }];
        assert!(prepare(&backend, &settings, None, &SpeculativeInput::None).is_ok());
    }
}
