//! Settings validation for flexible operations and remote procedures.
//!
//! All failures here are [`ConfigError`]s — caller bugs surfaced
//! synchronously, before any backend work starts.

use serde_json::Value;

use crate::{
    error::ConfigError,
    types::{Filter, FlexibleOp},
};

/// Validate flexible-operation settings and return the operation kind.
///
/// A flexible operation needs a non-empty table name, an operation kind, and
/// data or filters consistent with that kind: insert and upsert send data,
/// update sends data at rows selected by filters, delete only selects rows.
pub fn validate_flexible(
    table: Option<&str>,
    operation: Option<FlexibleOp>,
    payload: Option<&Value>,
    filters: &[Filter],
) -> Result<FlexibleOp, ConfigError> {
    if table.map(str::trim).filter(|t| !t.is_empty()).is_none() {
        return Err(ConfigError::MissingTableName);
    }

    let op = operation.ok_or(ConfigError::MissingFlexibleOperation)?;

    match op {
        FlexibleOp::Insert | FlexibleOp::Upsert => {
            if payload.is_none() {
                return Err(ConfigError::MissingPayload {
                    operation: op.label(),
                });
            }
        }
        FlexibleOp::Update => {
            if payload.is_none() {
                return Err(ConfigError::MissingPayload {
                    operation: op.label(),
                });
            }
            if filters.is_empty() {
                return Err(ConfigError::MissingFilters {
                    operation: op.label(),
                });
            }
        }
        FlexibleOp::Delete => {
            if filters.is_empty() {
                return Err(ConfigError::MissingFilters {
                    operation: op.label(),
                });
            }
        }
    }

    Ok(op)
}

/// Validate a remote-procedure call and return the procedure name.
pub fn validate_procedure(name: Option<&str>) -> Result<String, ConfigError> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingProcedureName)
}

// ============================================================================
// Tests
// ============================================================================
