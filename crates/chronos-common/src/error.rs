//! Error types for Chronos
//!
//! Every recoverable failure of the metadata layer is reported through the
//! single [`Error`] type. Each variant carries its arguments as fields and has
//! a stable message key (see [`Error::key`]) so failures can be logged and
//! matched programmatically.

use crate::types::ObjectKind;
use thiserror::Error;

/// Common result type for Chronos operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Chronos
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // Structural errors
    #[error("cycle detected in base schema chain: {}", .chain.join(" -> "))]
    SchemaCycle { chain: Vec<String> },

    #[error("base schema chain of {schema} exceeds {max_depth} schemas: {}", .chain.join(" -> "))]
    SchemaChainTooDeep {
        schema: String,
        max_depth: usize,
        chain: Vec<String>,
    },

    #[error("{container} #{number} already exists")]
    DuplicateNumber { container: String, number: u32 },

    #[error("{container} name {name:?} already used by #{owner}, cannot be given to #{number}")]
    DuplicateName {
        container: String,
        name: String,
        owner: u32,
        number: u32,
    },

    #[error("schema {schema} is incomplete: {reason}")]
    IncompleteSchema { schema: String, reason: String },

    #[error("schema {schema}: {reason}")]
    ConflictingEdit { schema: String, reason: String },

    #[error("schema {schema} is still used by {dependent}")]
    SchemaInUse { schema: String, dependent: String },

    // Type/value errors
    #[error("value {value:?} is incompatible with property {property} of type {value_type}")]
    IncompatibleValue {
        property: String,
        value_type: String,
        value: String,
    },

    #[error("invalid {value_type} value {input:?}: {reason}")]
    InvalidValue {
        value_type: String,
        input: String,
        reason: String,
    },

    // State errors
    #[error("{what} is not in edit mode")]
    NotEditable { what: String },

    #[error("{kind} surrogate is still in construction")]
    InConstruction { kind: ObjectKind },

    #[error("{kind} surrogate already committed with id {id}")]
    AlreadyCommitted { kind: ObjectKind, id: u64 },

    // Not found errors
    #[error("attribute {key} not found in {owner}")]
    AttributeNotFound { owner: String, key: String },

    #[error("series {key} not found in {owner}")]
    SeriesNotFound { owner: String, key: String },

    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("property not found: {0}")]
    PropertyNotFound(String),

    #[error("value type not found: {0}")]
    ValueTypeNotFound(String),

    #[error("chronicle not found: {0}")]
    ChronicleNotFound(String),

    // Surrounding collaborators
    #[error("permission {permission} denied on {object}")]
    PermissionDenied { permission: String, object: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a not-editable error for the named object
    pub fn not_editable(what: impl Into<String>) -> Self {
        Self::NotEditable { what: what.into() }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable message key identifying the kind of failure
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::SchemaCycle { .. } => "schema.cycle",
            Self::SchemaChainTooDeep { .. } => "schema.chain_too_deep",
            Self::DuplicateNumber { .. } => "container.duplicate_number",
            Self::DuplicateName { .. } => "container.duplicate_name",
            Self::IncompleteSchema { .. } => "schema.incomplete",
            Self::ConflictingEdit { .. } => "schema.conflicting_edit",
            Self::SchemaInUse { .. } => "schema.in_use",
            Self::IncompatibleValue { .. } => "value.incompatible",
            Self::InvalidValue { .. } => "value.invalid",
            Self::NotEditable { .. } => "state.not_editable",
            Self::InConstruction { .. } => "state.in_construction",
            Self::AlreadyCommitted { .. } => "state.already_committed",
            Self::AttributeNotFound { .. } => "not_found.attribute",
            Self::SeriesNotFound { .. } => "not_found.series",
            Self::SchemaNotFound(_) => "not_found.schema",
            Self::PropertyNotFound(_) => "not_found.property",
            Self::ValueTypeNotFound(_) => "not_found.value_type",
            Self::ChronicleNotFound(_) => "not_found.chronicle",
            Self::PermissionDenied { .. } => "permission.denied",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Backend(_) => "backend",
            Self::Configuration(_) => "configuration",
            Self::Internal(_) => "internal",
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AttributeNotFound { .. }
                | Self::SeriesNotFound { .. }
                | Self::SchemaNotFound(_)
                | Self::PropertyNotFound(_)
                | Self::ValueTypeNotFound(_)
                | Self::ChronicleNotFound(_)
        )
    }

    /// Check if this error reports a malformed schema or container
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SchemaCycle { .. }
                | Self::SchemaChainTooDeep { .. }
                | Self::DuplicateNumber { .. }
                | Self::DuplicateName { .. }
                | Self::IncompleteSchema { .. }
                | Self::ConflictingEdit { .. }
                | Self::SchemaInUse { .. }
        )
    }
}
