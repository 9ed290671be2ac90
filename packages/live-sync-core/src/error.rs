//! Error types for statement registration, transactions and view maintenance.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Coarse classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown table, alias or field, or malformed statement text.
    Resolution,
    /// Statement uses a feature the backend does not support.
    Capability,
    /// Unique or primary key violation on insert or update.
    DuplicateKey,
    /// Backend failure; aborts the current transaction.
    Storage,
    /// A view's narrowing query failed.
    Narrowing,
}

/// Live sync operation errors.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Statement text could not be tokenized or parsed
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// Table not found in the catalog
    #[error("Table '{table}' not found")]
    UnknownTable { table: String },

    /// Two FROM/JOIN participants share the same alias
    #[error("Alias '{alias}' is used more than once")]
    DuplicateAlias { alias: String },

    /// Field reference does not resolve
    #[error("Field '{field}' not found in '{table}'")]
    UnknownField { table: String, field: String },

    /// Unqualified field exists in more than one joined table
    #[error("Field '{field}' is ambiguous")]
    AmbiguousField { field: String },

    /// A statement references a parameter the caller did not supply
    #[error("Parameter '@{name}' has no value")]
    MissingParam { name: String },

    /// Table definition is invalid
    #[error("Invalid table definition for '{table}': {message}")]
    InvalidSchema { table: String, message: String },

    /// Table already exists
    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Backend lacks a capability the statement needs
    #[error("Backend does not support {feature}")]
    Capability { feature: &'static str },

    /// Duplicate primary or unique key
    #[error("Duplicate key '{key}' in table '{table}'")]
    DuplicateKey { table: String, key: String },

    /// Row violates a table constraint other than key uniqueness
    #[error("Constraint violation in table '{table}': {message}")]
    ConstraintViolation { table: String, message: String },

    /// Value cannot be converted to the field's type
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Backend I/O or driver failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transaction used after commit or rollback
    #[error("Transaction is {0}")]
    TransactionState(&'static str),

    /// Narrowing query of a view failed
    #[error("Narrowing failed for view '{view}': {message}")]
    Narrowing { view: String, message: String },
}

impl SyncError {
    /// Creates a syntax error at the given byte offset.
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        SyncError::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Syntax { .. }
            | SyncError::UnknownTable { .. }
            | SyncError::DuplicateAlias { .. }
            | SyncError::UnknownField { .. }
            | SyncError::AmbiguousField { .. }
            | SyncError::MissingParam { .. }
            | SyncError::InvalidSchema { .. }
            | SyncError::TableAlreadyExists(_)
            | SyncError::TypeMismatch { .. } => ErrorKind::Resolution,
            SyncError::Capability { .. } => ErrorKind::Capability,
            SyncError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            SyncError::ConstraintViolation { .. }
            | SyncError::Storage(_)
            | SyncError::TransactionState(_) => ErrorKind::Storage,
            SyncError::Narrowing { .. } => ErrorKind::Narrowing,
        }
    }

    /// Returns whether the caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::DuplicateKey { .. })
    }
}
