use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ConfigError;

// ============================================================================
// Rows and snapshots
// ============================================================================

/// Field stamped onto a speculative row to reconcile it once the server
/// confirms the mutation.
pub const OPTIMISTIC_ID_FIELD: &str = "optimisticId";

/// Field marking a row as not-yet-confirmed by the server.
pub const OPTIMISTIC_FLAG_FIELD: &str = "isOptimistic";

/// Stamp a fresh optimistic token and the pending marker onto a row.
///
/// Non-object values are returned unchanged — the caller is responsible for
/// only stamping row-shaped data.
pub fn stamp_optimistic(mut row: Value) -> Value {
    if let Some(map) = row.as_object_mut() {
        map.insert(
            OPTIMISTIC_ID_FIELD.to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );
        map.insert(OPTIMISTIC_FLAG_FIELD.to_string(), Value::Bool(true));
    }
    row
}

/// The cached view of a query result — authoritative or speculative.
///
/// `count`, when tracked, follows the `data` deltas applied by the optimistic
/// transforms: insert adds one, delete removes one, edit and replace leave it
/// alone or substitute a caller-supplied value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub data: Option<Vec<Value>>,
    pub count: Option<i64>,
}

impl CachedSnapshot {
    /// The null-shaped snapshot — no data, no count.
    pub fn empty() -> Self {
        Self {
            data: None,
            count: None,
        }
    }
}

/// Whether the cache maintains a row count alongside data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    Exact,
    Estimated,
    None,
}

/// The uniform success shape of every backend mutation primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub data: Option<Value>,
    pub count: Option<i64>,
}

// ============================================================================
// Mutation kinds
// ============================================================================

/// The five mutation kinds the coordinator dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
    FlexibleOperation,
    RemoteProcedure,
}

impl MutationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::FlexibleOperation => "flexible-operation",
            Self::RemoteProcedure => "remote-procedure",
        }
    }
}

// ============================================================================
// Optimistic operations
// ============================================================================

/// The optimistic behavior a flexible or remote-procedure mutation requests,
/// independently of the real operation it runs (a flexible upsert may ask for
/// edit-row optimistics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OptimisticOp {
    AddRow,
    EditRow,
    DeleteRow,
    ReplaceData,
}

impl OptimisticOp {
    /// Parse the raw host-tool setting.
    ///
    /// An unset-then-cleared configuration field arrives as an empty string
    /// rather than being absent; both map to `None`. Anything else must be a
    /// recognized operation name.
    pub fn parse(raw: Option<&str>) -> Result<Option<Self>, ConfigError> {
        match raw {
            None | Some("") => Ok(None),
            Some("addRow") => Ok(Some(Self::AddRow)),
            Some("editRow") => Ok(Some(Self::EditRow)),
            Some("deleteRow") => Ok(Some(Self::DeleteRow)),
            Some("replaceData") => Ok(Some(Self::ReplaceData)),
            Some(other) => Err(ConfigError::UnknownOptimisticOperation(other.to_string())),
        }
    }
}

// ============================================================================
// Flexible operations
// ============================================================================

/// Recognized operation kinds for the flexible (table + filters) mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexibleOp {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl FlexibleOp {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }

    /// Parse a host-supplied operation name.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "upsert" => Ok(Self::Upsert),
            "delete" => Ok(Self::Delete),
            other => Err(ConfigError::UnknownFlexibleOperation(other.to_string())),
        }
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Comparison operator for a flexible-operation filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
}

/// A single column filter applied by the flexible backend primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

// ============================================================================
// Tests
// ============================================================================
