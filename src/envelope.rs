//! Result normalization — the uniform envelope returned to callers and
//! passed to success/error callbacks, plus the summary phrase lookup.

use serde::Serialize;
use serde_json::Value;

use crate::types::{BackendResponse, MutationKind};

// ============================================================================
// Status and summaries
// ============================================================================

/// Lifecycle status of one mutation call.
///
/// `Pending` is only ever returned when immediate resolution was requested;
/// it always precedes an eventual `Success` or `Error` delivered via
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Success,
    Error,
}

/// Human-readable summary phrase for a mutation kind and outcome.
pub fn summary(kind: MutationKind, status: MutationStatus) -> &'static str {
    match (kind, status) {
        (MutationKind::Insert, MutationStatus::Pending) => "Adding row",
        (MutationKind::Insert, MutationStatus::Success) => "Row added",
        (MutationKind::Insert, MutationStatus::Error) => "Failed to add row",
        (MutationKind::Update, MutationStatus::Pending) => "Updating row",
        (MutationKind::Update, MutationStatus::Success) => "Row updated",
        (MutationKind::Update, MutationStatus::Error) => "Failed to update row",
        (MutationKind::Delete, MutationStatus::Pending) => "Deleting row",
        (MutationKind::Delete, MutationStatus::Success) => "Row deleted",
        (MutationKind::Delete, MutationStatus::Error) => "Failed to delete row",
        (MutationKind::FlexibleOperation, MutationStatus::Pending) => "Running operation",
        (MutationKind::FlexibleOperation, MutationStatus::Success) => "Operation complete",
        (MutationKind::FlexibleOperation, MutationStatus::Error) => "Operation failed",
        (MutationKind::RemoteProcedure, MutationStatus::Pending) => "Calling procedure",
        (MutationKind::RemoteProcedure, MutationStatus::Success) => "Procedure complete",
        (MutationKind::RemoteProcedure, MutationStatus::Error) => "Procedure call failed",
    }
}

// ============================================================================
// MutationFailure
// ============================================================================

/// Normalized error object delivered on a failed mutation: what was
/// attempted, with what inputs, and why it failed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationFailure {
    pub message: String,
    pub action: MutationKind,
    pub summary: String,
    pub payload: Option<Value>,
    pub optimistic_input: Option<Value>,
    pub metadata: Option<Value>,
}

// ============================================================================
// MutationEnvelope
// ============================================================================

/// The uniform result shape for every mutation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEnvelope {
    pub status: MutationStatus,
    pub action: MutationKind,
    pub summary: String,
    /// Server-returned data, present on success.
    pub data: Option<Value>,
    /// Server-returned count, present on success.
    pub count: Option<i64>,
    /// Echo of the speculative input the optimistic transform used.
    pub optimistic_data: Option<Value>,
    pub optimistic_count: Option<i64>,
    /// The data that was (or will be) sent to the backend.
    pub payload: Option<Value>,
    pub error: Option<MutationFailure>,
    /// Free-form caller metadata, passed through untouched.
    pub metadata: Option<Value>,
}

impl MutationEnvelope {
    /// The envelope returned immediately while the mutation keeps running.
    pub fn pending(
        action: MutationKind,
        payload: Option<Value>,
        optimistic_data: Option<Value>,
        optimistic_count: Option<i64>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            status: MutationStatus::Pending,
            action,
            summary: summary(action, MutationStatus::Pending).to_string(),
            data: None,
            count: None,
            optimistic_data,
            optimistic_count,
            payload,
            error: None,
            metadata,
        }
    }

    /// The envelope for a confirmed mutation.
    pub fn success(
        action: MutationKind,
        response: Option<BackendResponse>,
        payload: Option<Value>,
        optimistic_data: Option<Value>,
        optimistic_count: Option<i64>,
        metadata: Option<Value>,
    ) -> Self {
        let (data, count) = match response {
            Some(response) => (response.data, response.count),
            None => (None, None),
        };
        Self {
            status: MutationStatus::Success,
            action,
            summary: summary(action, MutationStatus::Success).to_string(),
            data,
            count,
            optimistic_data,
            optimistic_count,
            payload,
            error: None,
            metadata,
        }
    }

    /// The envelope for a failed mutation — the failure is reported here,
    /// never thrown past the coordinator.
    pub fn failure(
        action: MutationKind,
        message: String,
        payload: Option<Value>,
        optimistic_data: Option<Value>,
        optimistic_count: Option<i64>,
        metadata: Option<Value>,
    ) -> Self {
        let summary_text = summary(action, MutationStatus::Error).to_string();
        Self {
            status: MutationStatus::Error,
            action,
            summary: summary_text.clone(),
            data: None,
            count: None,
            optimistic_data: optimistic_data.clone(),
            optimistic_count,
            payload: payload.clone(),
            error: Some(MutationFailure {
                message,
                action,
                summary: summary_text,
                payload,
                optimistic_input: optimistic_data,
                metadata: metadata.clone(),
            }),
            metadata,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
