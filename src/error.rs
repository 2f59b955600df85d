use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A caller/integration bug in the mutation settings.
///
/// Raised synchronously, before any asynchronous work starts, and never
/// converted into an error envelope — misconfiguration must surface during
/// development rather than be rendered as a runtime failure state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Supply either an optimistic row or an optimistic dataset, not both")]
    ConflictingOptimisticInputs,

    #[error("Flexible operation requires a table name")]
    MissingTableName,

    #[error("Flexible operation requires an operation kind")]
    MissingFlexibleOperation,

    #[error("Flexible {operation} requires data to send")]
    MissingPayload { operation: &'static str },

    #[error("Flexible {operation} requires at least one filter")]
    MissingFilters { operation: &'static str },

    #[error("Remote procedure call requires a procedure name")]
    MissingProcedureName,

    #[error("Unknown optimistic operation: \"{0}\"")]
    UnknownOptimisticOperation(String),

    #[error("Unknown flexible operation: \"{0}\"")]
    UnknownFlexibleOperation(String),

    #[error("Optimistic dataset must be an array of rows or a single row object")]
    InvalidSpeculativeDataset,
}

// ---------------------------------------------------------------------------
// TransformError
// ---------------------------------------------------------------------------

/// Invalid speculative input detected when an optimistic transform is applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Optimistic delete requires a scalar \"{field}\" value, received {received}")]
    NonScalarRowId { field: String, received: String },
}

// ---------------------------------------------------------------------------
// DatabindError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DatabindError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),
}

/// Convenience alias — the default error type is `DatabindError`.
pub type Result<T, E = DatabindError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
