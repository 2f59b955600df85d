//! Optimistic snapshot transforms and transform selection.
//!
//! Every transform is a pure function from the current cached snapshot (and
//! the speculative input) to a new snapshot. The external cache applies the
//! chosen transform before the real mutation settles and rolls the snapshot
//! back if it fails; nothing here mutates shared state.

use serde_json::Value;

use crate::{
    error::TransformError,
    order::{sort_rows, OrderEntry},
    types::{CachedSnapshot, CountMode, OptimisticOp},
};

// ============================================================================
// Transform union
// ============================================================================

/// The closed set of optimistic transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimisticTransform {
    /// Leave the snapshot untouched.
    Identity,
    /// Append the speculative row, re-sort, bump the count.
    Insert,
    /// Replace the row matching the speculative row's identifier, re-sort.
    Edit,
    /// Remove the row matching the speculative identifier, drop the count.
    Delete,
    /// Substitute the whole dataset and count.
    Replace,
}

/// The materialized speculative input for one mutation call.
///
/// At most one shape is populated per call; the coordinator rejects settings
/// that supply both a row and a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeculativeInput {
    None,
    Row(Value),
    Dataset(Vec<Value>),
}

impl SpeculativeInput {
    pub fn row(&self) -> Option<&Value> {
        match self {
            Self::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn dataset(&self) -> Option<&[Value]> {
        match self {
            Self::Dataset(rows) => Some(rows),
            _ => None,
        }
    }

    /// The input as a plain JSON value, for echoing into result envelopes.
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Row(row) => Some(row.clone()),
            Self::Dataset(rows) => Some(Value::Array(rows.clone())),
        }
    }
}

/// Call-scoped context the transforms need: the active order specification,
/// the unique-identifier field, the count-tracking mode, and the
/// caller-supplied replacement count.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub order_by: Vec<OrderEntry>,
    pub id_field: String,
    pub count_mode: CountMode,
    pub speculative_count: Option<i64>,
}

// ============================================================================
// Selection
// ============================================================================

/// Pick the transform for a requested optimistic operation.
///
/// An unset operation, or one whose required speculative input was not
/// supplied, falls back to the identity transform. Unrecognized operation
/// names never reach this point — [`OptimisticOp::parse`] rejects them at
/// the settings boundary.
pub fn choose(
    requested: Option<OptimisticOp>,
    has_row: bool,
    has_dataset: bool,
) -> OptimisticTransform {
    match requested {
        None => OptimisticTransform::Identity,
        Some(OptimisticOp::AddRow) if has_row => OptimisticTransform::Insert,
        Some(OptimisticOp::EditRow) if has_row => OptimisticTransform::Edit,
        Some(OptimisticOp::DeleteRow) if has_row => OptimisticTransform::Delete,
        Some(OptimisticOp::ReplaceData) if has_dataset => OptimisticTransform::Replace,
        Some(_) => OptimisticTransform::Identity,
    }
}

// ============================================================================
// Application
// ============================================================================

/// Apply a transform to the current snapshot.
///
/// `current` absent is treated as the null-shaped snapshot; edit, delete and
/// replace short-circuit on it rather than operate on missing data.
pub fn apply(
    transform: OptimisticTransform,
    current: Option<&CachedSnapshot>,
    input: &SpeculativeInput,
    ctx: &TransformContext,
) -> Result<CachedSnapshot, TransformError> {
    match (transform, input) {
        (OptimisticTransform::Insert, SpeculativeInput::Row(row)) => {
            Ok(insert(current, row, ctx))
        }
        (OptimisticTransform::Edit, SpeculativeInput::Row(row)) => Ok(edit(current, row, ctx)),
        (OptimisticTransform::Delete, SpeculativeInput::Row(row)) => delete(current, row, ctx),
        (OptimisticTransform::Replace, SpeculativeInput::Dataset(rows)) => {
            Ok(replace(current, rows, ctx))
        }
        // Identity, or a transform whose required input shape is missing.
        _ => Ok(identity(current)),
    }
}

/// Returns the current snapshot unchanged, or the null-shaped snapshot.
fn identity(current: Option<&CachedSnapshot>) -> CachedSnapshot {
    current.cloned().unwrap_or_else(CachedSnapshot::empty)
}

fn insert(current: Option<&CachedSnapshot>, row: &Value, ctx: &TransformContext) -> CachedSnapshot {
    let mut rows = current
        .and_then(|snapshot| snapshot.data.clone())
        .unwrap_or_default();
    rows.push(row.clone());

    CachedSnapshot {
        data: Some(sort_rows(&ctx.order_by, rows)),
        count: shifted_count(current, ctx, 1),
    }
}

fn edit(current: Option<&CachedSnapshot>, row: &Value, ctx: &TransformContext) -> CachedSnapshot {
    let Some(current) = current else {
        return CachedSnapshot::empty();
    };
    let Some(target) = row.get(&ctx.id_field) else {
        return current.clone();
    };

    // An edit may change the sort position of the replaced row.
    let data = current.data.as_ref().map(|rows| {
        let replaced: Vec<Value> = rows
            .iter()
            .map(|existing| {
                if existing.get(&ctx.id_field) == Some(target) {
                    row.clone()
                } else {
                    existing.clone()
                }
            })
            .collect();
        sort_rows(&ctx.order_by, replaced)
    });

    CachedSnapshot {
        data,
        count: current.count,
    }
}

fn delete(
    current: Option<&CachedSnapshot>,
    row: &Value,
    ctx: &TransformContext,
) -> Result<CachedSnapshot, TransformError> {
    let id = scalar_id(row, &ctx.id_field).ok_or_else(|| TransformError::NonScalarRowId {
        field: ctx.id_field.clone(),
        received: value_shape(row.get(&ctx.id_field)).to_string(),
    })?;

    let Some(current) = current else {
        return Ok(CachedSnapshot::empty());
    };

    // Removal cannot change the relative order of the surviving rows, so no
    // re-sort. The count drops for every requested delete, matched or not.
    let data = current.data.as_ref().map(|rows| {
        rows.iter()
            .filter(|existing| existing.get(&ctx.id_field) != Some(&id))
            .cloned()
            .collect()
    });

    Ok(CachedSnapshot {
        data,
        count: shifted_count(Some(current), ctx, -1),
    })
}

fn replace(
    current: Option<&CachedSnapshot>,
    rows: &[Value],
    ctx: &TransformContext,
) -> CachedSnapshot {
    if current.is_none() {
        return CachedSnapshot::empty();
    }

    CachedSnapshot {
        data: Some(rows.to_vec()),
        count: ctx.speculative_count,
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn shifted_count(
    current: Option<&CachedSnapshot>,
    ctx: &TransformContext,
    delta: i64,
) -> Option<i64> {
    match ctx.count_mode {
        CountMode::None => None,
        CountMode::Exact | CountMode::Estimated => {
            Some(current.and_then(|snapshot| snapshot.count).unwrap_or(0) + delta)
        }
    }
}

/// The unique-identifier value of a row, if it is a scalar (string or number).
pub fn scalar_id(row: &Value, field: &str) -> Option<Value> {
    match row.get(field) {
        Some(v @ (Value::String(_) | Value::Number(_))) => Some(v.clone()),
        _ => None,
    }
}

/// Check that a speculative row carries a scalar identifier, so a delete can
/// fail before any backend call is made.
pub fn require_scalar_id(row: &Value, field: &str) -> Result<(), TransformError> {
    if scalar_id(row, field).is_some() {
        return Ok(());
    }
    Err(TransformError::NonScalarRowId {
        field: field.to_string(),
        received: value_shape(row.get(field)).to_string(),
    })
}

fn value_shape(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderEntry;
    use serde_json::json;

    fn ctx() -> TransformContext {
        TransformContext {
            order_by: vec![OrderEntry::asc("name")],
            id_field: "id".to_string(),
            count_mode: CountMode::Exact,
            speculative_count: None,
        }
    }

    fn snapshot(rows: Vec<Value>, count: i64) -> CachedSnapshot {
        CachedSnapshot {
            data: Some(rows),
            count: Some(count),
        }
    }

    // --- choose ---

    #[test]
    fn choose_unset_operation_is_identity() {
        assert_eq!(choose(None, true, true), OptimisticTransform::Identity);
    }

    #[test]
    fn choose_row_operations_require_a_row() {
        assert_eq!(
            choose(Some(OptimisticOp::AddRow), true, false),
            OptimisticTransform::Insert
        );
        assert_eq!(
            choose(Some(OptimisticOp::AddRow), false, false),
            OptimisticTransform::Identity
        );
        assert_eq!(
            choose(Some(OptimisticOp::EditRow), true, false),
            OptimisticTransform::Edit
        );
        assert_eq!(
            choose(Some(OptimisticOp::DeleteRow), false, true),
            OptimisticTransform::Identity
        );
    }

    #[test]
    fn choose_replace_requires_a_dataset() {
        assert_eq!(
            choose(Some(OptimisticOp::ReplaceData), false, true),
            OptimisticTransform::Replace
        );
        assert_eq!(
            choose(Some(OptimisticOp::ReplaceData), true, false),
            OptimisticTransform::Identity
        );
    }

    // --- identity ---

    #[test]
    fn identity_returns_snapshot_unchanged() {
        let current = snapshot(vec![json!({"id": 1})], 1);
        let result = apply(
            OptimisticTransform::Identity,
            Some(&current),
            &SpeculativeInput::None,
            &ctx(),
        )
        .unwrap();
        assert_eq!(result, current);
    }

    #[test]
    fn identity_absent_snapshot_is_null_shaped() {
        let result = apply(
            OptimisticTransform::Identity,
            None,
            &SpeculativeInput::None,
            &ctx(),
        )
        .unwrap();
        assert_eq!(result, CachedSnapshot::empty());
    }

    // --- insert ---

    #[test]
    fn insert_appends_sorts_and_bumps_count() {
        let current = snapshot(
            vec![json!({"id": 1, "name": "Ada"}), json!({"id": 2, "name": "Cara"})],
            2,
        );
        let input = SpeculativeInput::Row(json!({"id": 3, "name": "Bob"}));
        let result =
            apply(OptimisticTransform::Insert, Some(&current), &input, &ctx()).unwrap();

        let names: Vec<&str> = result
            .data
            .as_ref()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Ada", "Bob", "Cara"]);
        assert_eq!(result.count, Some(3));
        // Purity — the original snapshot is untouched.
        assert_eq!(current.data.as_ref().unwrap().len(), 2);
        assert_eq!(current.count, Some(2));
    }

    #[test]
    fn insert_into_absent_snapshot_starts_from_empty() {
        let input = SpeculativeInput::Row(json!({"id": 1, "name": "Ada"}));
        let result = apply(OptimisticTransform::Insert, None, &input, &ctx()).unwrap();
        assert_eq!(result.data.as_ref().unwrap().len(), 1);
        assert_eq!(result.count, Some(1));
    }

    #[test]
    fn insert_count_disabled_stays_null() {
        let mut c = ctx();
        c.count_mode = CountMode::None;
        let current = snapshot(vec![json!({"id": 1, "name": "Ada"})], 1);
        let input = SpeculativeInput::Row(json!({"id": 2, "name": "Bob"}));
        let result = apply(OptimisticTransform::Insert, Some(&current), &input, &c).unwrap();
        assert_eq!(result.count, None);
    }

    // --- edit ---

    #[test]
    fn edit_replaces_matching_row_and_resorts() {
        let current = snapshot(
            vec![json!({"id": 1, "name": "Ada"}), json!({"id": 2, "name": "Bob"})],
            2,
        );
        let input = SpeculativeInput::Row(json!({"id": 1, "name": "Zoe"}));
        let result = apply(OptimisticTransform::Edit, Some(&current), &input, &ctx()).unwrap();

        let rows = result.data.as_ref().unwrap();
        assert_eq!(rows.len(), 2);
        // Renaming Ada to Zoe moves the row to the end of the name order.
        assert_eq!(rows[0]["name"], json!("Bob"));
        assert_eq!(rows[1]["name"], json!("Zoe"));
        assert_eq!(result.count, Some(2));
    }

    #[test]
    fn edit_without_match_changes_nothing_but_order() {
        let current = snapshot(
            vec![json!({"id": 1, "name": "Ada"}), json!({"id": 2, "name": "Bob"})],
            2,
        );
        let input = SpeculativeInput::Row(json!({"id": 9, "name": "Zoe"}));
        let result = apply(OptimisticTransform::Edit, Some(&current), &input, &ctx()).unwrap();
        assert_eq!(result.data.as_ref().unwrap().len(), 2);
        assert_eq!(result.count, Some(2));
    }

    #[test]
    fn edit_absent_snapshot_short_circuits() {
        let input = SpeculativeInput::Row(json!({"id": 1}));
        let result = apply(OptimisticTransform::Edit, None, &input, &ctx()).unwrap();
        assert_eq!(result, CachedSnapshot::empty());
    }

    // --- delete ---

    #[test]
    fn delete_removes_matching_row_and_drops_count() {
        let current = snapshot(
            vec![json!({"id": 1, "name": "Ada"}), json!({"id": 2, "name": "Bob"})],
            2,
        );
        let input = SpeculativeInput::Row(json!({"id": 2}));
        let result =
            apply(OptimisticTransform::Delete, Some(&current), &input, &ctx()).unwrap();

        let rows = result.data.as_ref().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(result.count, Some(1));
    }

    #[test]
    fn delete_miss_still_drops_count() {
        // The decrement is unconditional on a requested delete — a miss keeps
        // the rows but the tracked count still drops.
        let current = snapshot(vec![json!({"id": 1}), json!({"id": 2})], 2);
        let input = SpeculativeInput::Row(json!({"id": 5}));
        let result =
            apply(OptimisticTransform::Delete, Some(&current), &input, &ctx()).unwrap();
        assert_eq!(result.data.as_ref().unwrap().len(), 2);
        assert_eq!(result.count, Some(1));
    }

    #[test]
    fn delete_requires_scalar_identifier() {
        let current = snapshot(vec![json!({"id": 1})], 1);
        for bad in [json!({}), json!({"id": null}), json!({"id": {"nested": 1}})] {
            let input = SpeculativeInput::Row(bad);
            let err = apply(OptimisticTransform::Delete, Some(&current), &input, &ctx())
                .unwrap_err();
            assert!(matches!(err, TransformError::NonScalarRowId { .. }));
        }
    }

    #[test]
    fn delete_accepts_string_identifier() {
        let current = snapshot(vec![json!({"id": "a"}), json!({"id": "b"})], 2);
        let input = SpeculativeInput::Row(json!({"id": "a"}));
        let result =
            apply(OptimisticTransform::Delete, Some(&current), &input, &ctx()).unwrap();
        assert_eq!(result.data.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn delete_absent_snapshot_short_circuits() {
        let input = SpeculativeInput::Row(json!({"id": 1}));
        let result = apply(OptimisticTransform::Delete, None, &input, &ctx()).unwrap();
        assert_eq!(result, CachedSnapshot::empty());
    }

    // --- replace ---

    #[test]
    fn replace_substitutes_data_and_count() {
        let current = snapshot(vec![json!({"id": 1})], 1);
        let mut c = ctx();
        c.speculative_count = Some(7);
        let input = SpeculativeInput::Dataset(vec![json!({"id": 8}), json!({"id": 9})]);
        let result = apply(OptimisticTransform::Replace, Some(&current), &input, &c).unwrap();
        assert_eq!(result.data.as_ref().unwrap().len(), 2);
        assert_eq!(result.count, Some(7));
    }

    #[test]
    fn replace_without_caller_count_is_null() {
        let current = snapshot(vec![json!({"id": 1})], 1);
        let input = SpeculativeInput::Dataset(vec![]);
        let result =
            apply(OptimisticTransform::Replace, Some(&current), &input, &ctx()).unwrap();
        assert_eq!(result.count, None);
    }

    #[test]
    fn replace_absent_snapshot_short_circuits() {
        let input = SpeculativeInput::Dataset(vec![json!({"id": 1})]);
        let result = apply(OptimisticTransform::Replace, None, &input, &ctx()).unwrap();
        assert_eq!(result, CachedSnapshot::empty());
    }

    // --- require_scalar_id ---

    #[test]
    fn require_scalar_id_reports_received_shape() {
        let err = require_scalar_id(&json!({"id": [1]}), "id").unwrap_err();
        assert!(err.to_string().contains("array"), "shape missing: {err}");
        let err = require_scalar_id(&json!({}), "id").unwrap_err();
        assert!(err.to_string().contains("missing"), "shape missing: {err}");
    }
}
