//! Error types for the docbatch crate.

/// Batch and search/replace error types.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// Only object fields can hold sub-fields.
    #[error("field \"{key}\" is not an object")]
    NotAnObject { key: String },

    /// A field can be attached to a single parent, once.
    #[error("field \"{key}\" already has a parent")]
    AlreadyHasParent { key: String },

    /// Two sibling fields share the same name.
    #[error("duplicate field \"{name}\"")]
    DuplicateField { name: String },

    /// Lookup of a field that is not registered.
    #[error("field not found \"{name}\"")]
    FieldNotFound { name: String },

    /// Search/replace requested on an object field.
    #[error("search/replace is not allowed on field \"{key}\"")]
    SearchReplaceNotAllowed { key: String },

    /// Operation built against a field of the wrong content kind.
    #[error("invalid field type for operation on \"{key}\"")]
    InvalidFieldType { key: String },

    /// Field sits below the second nesting level.
    #[error("field \"{key}\" is nested too deeply for search/replace (at most field.subfield)")]
    NestingTooDeep { key: String },

    /// Malformed typed-field setup.
    #[error("cannot add typed fields to \"{field}\": {reason}")]
    TypedFields { field: String, reason: String },

    /// A field name submitted by the user does not exist.
    #[error("the field {name} does not exist")]
    UnknownField { name: String },

    /// No batch registered under this name.
    #[error("unknown batch: {0}")]
    UnknownBatch(String),

    /// No schema is known for this record type.
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),

    /// No database registered for this post type.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),

    /// A record id from the result set could not be loaded.
    #[error("record not found: {id}")]
    RecordNotFound { id: u64 },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for docbatch operations.
pub type BatchResult<T> = Result<T, BatchError>;
