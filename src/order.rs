//! Order specification and client-side row sorting.
//!
//! Optimistic inserts and edits re-sort the cached rows locally so the UI
//! shows the speculative row in its final position instead of at the end.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Order Types
// ============================================================================

/// Sort direction for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// An order specification for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Order input — either a shorthand field name (ascending) or explicit entries.
#[derive(Debug, Clone)]
pub enum OrderInput {
    /// Single field name, sorts ascending.
    Field(String),
    /// Explicit ordered entries.
    Entries(Vec<OrderEntry>),
}

/// Normalize order input to a vec of `OrderEntry`.
pub fn normalize_order(order: Option<OrderInput>) -> Vec<OrderEntry> {
    match order {
        None => Vec::new(),
        Some(OrderInput::Field(f)) => vec![OrderEntry::asc(f)],
        Some(OrderInput::Entries(e)) => e,
    }
}

// ============================================================================
// Value Comparison
// ============================================================================

/// Compare two JSON values for ordering.
///
/// - Both Null → Equal
/// - a is Null → Greater (nulls sort to end)
/// - b is Null → Less
/// - Both numbers → f64 comparison (NaN treated as Equal)
/// - Both strings → lexicographic (codepoint order)
/// - Both booleans → false < true
/// - Cross-type → type rank: number(0), string(1), bool(2), other(3)
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        _ => 3,
    }
}

// ============================================================================
// Field Path Resolution
// ============================================================================

/// Get a nested value from a row using a dot-separated path.
/// Returns `None` if any path segment is missing or the parent is not an object.
pub fn get_field_value<'a>(row: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = row;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

// ============================================================================
// Row Sorting
// ============================================================================

/// Sort rows by the active order specification.
///
/// Stable; an empty specification returns the rows unchanged. Missing fields
/// sort as Null (to the end under ascending order).
pub fn sort_rows(order: &[OrderEntry], mut rows: Vec<Value>) -> Vec<Value> {
    if order.is_empty() {
        return rows;
    }

    rows.sort_by(|a, b| {
        for entry in order {
            let va = get_field_value(a, &entry.field).unwrap_or(&Value::Null);
            let vb = get_field_value(b, &entry.field).unwrap_or(&Value::Null);
            let cmp = compare_values(va, vb);
            if cmp != Ordering::Equal {
                return if entry.direction == SortDirection::Desc {
                    cmp.reverse()
                } else {
                    cmp
                };
            }
        }
        Ordering::Equal
    });
    rows
}

// ============================================================================
// Tests
// ============================================================================
