//! Backend trait — the remote mutation primitives the coordinator drives.
//!
//! Implementations handle the actual network calls to the relational
//! backend. Every primitive resolves to the uniform [`BackendResponse`]
//! shape or fails with a [`BackendError`]; the coordinator treats any such
//! failure uniformly as a mutation failure.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{BackendResponse, Filter, FlexibleOp};

// ============================================================================
// Backend trait
// ============================================================================

#[async_trait]
pub trait Backend: Send + Sync {
    /// Insert a row into `table`, returning the confirmed row(s) per the
    /// `columns` projection.
    async fn insert_row(
        &self,
        table: &str,
        columns: Option<&str>,
        id_field: &str,
        payload: &Value,
    ) -> Result<BackendResponse, BackendError>;

    /// Update the row identified by `payload[id_field]`.
    async fn update_row(
        &self,
        table: &str,
        columns: Option<&str>,
        id_field: &str,
        payload: &Value,
    ) -> Result<BackendResponse, BackendError>;

    /// Delete the row identified by `payload[id_field]`.
    async fn delete_row(
        &self,
        table: &str,
        columns: Option<&str>,
        id_field: &str,
        payload: &Value,
    ) -> Result<BackendResponse, BackendError>;

    /// Run a filter-oriented operation against `table`. `return_record`
    /// requests the confirmed row(s) back after the operation completes.
    async fn run_flexible_operation(
        &self,
        table: &str,
        operation: FlexibleOp,
        payload: Option<&Value>,
        filters: &[Filter],
        return_record: bool,
    ) -> Result<BackendResponse, BackendError>;

    /// Invoke a named remote procedure with an arbitrary payload.
    async fn run_remote_procedure(
        &self,
        procedure: &str,
        args: Option<&Value>,
    ) -> Result<BackendResponse, BackendError>;
}

// ============================================================================
// BackendError
// ============================================================================

/// Backend-level error (wraps arbitrary error strings from the network or
/// database layer, with an optional backend-specific code).
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

// ============================================================================
// Tests
// ============================================================================
