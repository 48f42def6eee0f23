//! Error types for the Brainy database core.
//!
//! The crate uses a hierarchical error system:
//! - [`BrainyError`] is the top-level error returned by all public APIs
//! - Specific error types ([`StorageError`], [`ValidationError`],
//!   [`NotFoundError`]) provide detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use brainy_db::{BrainyDb, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let db = BrainyDb::open("./brainy.db", Config::default())?;
//!     // ... operations that may fail ...
//!     db.shut_down()?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Brainy operations.
pub type Result<T> = std::result::Result<T, BrainyError>;

/// Top-level error enum for all Brainy operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching, or the `is_*` helper methods, to handle specific
/// error classes.
#[derive(Debug, Error)]
pub enum BrainyError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding generation/validation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index error (HNSW operations).
    #[error("Vector index error: {0}")]
    Vector(String),

    /// The database is open read-only and rejected a mutation.
    #[error("Operation '{operation}' rejected: database is read-only")]
    ReadOnly {
        /// Name of the rejected operation.
        operation: String,
    },

    /// The database is open write-only and rejected a read/search.
    #[error("Operation '{operation}' rejected: database is write-only")]
    WriteOnly {
        /// Name of the rejected operation.
        operation: String,
    },

    /// The database is frozen and rejected a mutation or background task.
    #[error("Operation '{operation}' rejected: database is frozen")]
    Frozen {
        /// Name of the rejected operation.
        operation: String,
    },

    /// Operation exceeded its configured time budget.
    #[error("Operation '{operation}' timed out after {budget_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// Configured budget in milliseconds.
        budget_ms: u64,
    },

    /// Transient network/storage I/O failure; retryable with backoff.
    #[error("Network error: {0}")]
    Network(String),

    /// Final attempt's cause after configured retries were exhausted.
    #[error("Retry exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The underlying cause of the final failed attempt.
        #[source]
        source: Box<BrainyError>,
    },

    /// Vector length did not match the database's configured dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// A cooperative cancellation signal was observed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl BrainyError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a vector index error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Creates a read-only mode violation error.
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnly {
            operation: operation.into(),
        }
    }

    /// Creates a write-only mode violation error.
    pub fn write_only(operation: impl Into<String>) -> Self {
        Self::WriteOnly {
            operation: operation.into(),
        }
    }

    /// Creates a frozen-mode violation error.
    pub fn frozen(operation: impl Into<String>) -> Self {
        Self::Frozen {
            operation: operation.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, budget_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            budget_ms,
        }
    }

    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DimensionMismatch { .. })
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a vector index error.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// Returns true if this is a mode-violation error (`ReadOnly`,
    /// `WriteOnly`, or `Frozen`).
    pub fn is_mode_violation(&self) -> bool {
        matches!(self, Self::ReadOnly { .. } | Self::WriteOnly { .. } | Self::Frozen { .. })
    }

    /// Returns true if the operation that produced this error is safe to
    /// retry (per the §7 error taxonomy: `Timeout`, `Network`, and the
    /// wrapped cause of `RetryExhausted` are retryable; everything else is
    /// not).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network(_))
    }

    /// Returns true if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database file not found at expected path.
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// Table not found in database.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// The write-ahead log could not be read or appended to.
    #[error("WAL error: {0}")]
    Wal(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a serialization error with the given message.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }

    /// Creates a WAL error with the given message.
    pub fn wal(msg: impl Into<String>) -> Self {
        Self::Wal(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

// Convert bincode errors to StorageError
impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// Also allow direct conversion to BrainyError for convenience
impl From<redb::Error> for BrainyError {
    fn from(err: redb::Error) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<redb::DatabaseError> for BrainyError {
    fn from(err: redb::DatabaseError) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<redb::TransactionError> for BrainyError {
    fn from(err: redb::TransactionError) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<redb::CommitError> for BrainyError {
    fn from(err: redb::CommitError) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<redb::TableError> for BrainyError {
    fn from(err: redb::TableError) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<redb::StorageError> for BrainyError {
    fn from(err: redb::StorageError) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

impl From<bincode::Error> for BrainyError {
    fn from(err: bincode::Error) -> Self {
        BrainyError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the database's configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from the database configuration.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Content exceeds maximum allowed size.
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Too many items in a collection field.
    #[error("Too many items in '{field}': {count} (max: {max})")]
    TooManyItems {
        /// Name of the field.
        field: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// An unknown noun_type or verb_type was supplied.
    #[error("Unknown {kind} type: '{value}'")]
    UnknownType {
        /// Either "noun" or "verb".
        kind: &'static str,
        /// The offending type string.
        value: String,
    },

    /// A metadata filter tree failed to compile (unknown operator, wrong
    /// operand shape, invalid regex, depth exceeded).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(size: usize, max: usize) -> Self {
        Self::ContentTooLarge { size, max }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a too many items error.
    pub fn too_many_items(field: impl Into<String>, count: usize, max: usize) -> Self {
        Self::TooManyItems {
            field: field.into(),
            count,
            max,
        }
    }

    /// Creates an unknown noun-type error.
    pub fn unknown_noun_type(value: impl Into<String>) -> Self {
        Self::UnknownType {
            kind: "noun",
            value: value.into(),
        }
    }

    /// Creates an unknown verb-type error.
    pub fn unknown_verb_type(value: impl Into<String>) -> Self {
        Self::UnknownType {
            kind: "verb",
            value: value.into(),
        }
    }

    /// Creates an invalid filter error.
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Noun with given ID not found.
    #[error("Noun not found: {0}")]
    Noun(String),

    /// Verb with given ID not found.
    #[error("Verb not found: {0}")]
    Verb(String),
}

impl NotFoundError {
    /// Creates a noun-not-found error.
    pub fn noun(id: impl ToString) -> Self {
        Self::Noun(id.to_string())
    }

    /// Creates a verb-not-found error.
    pub fn verb(id: impl ToString) -> Self {
        Self::Verb(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BrainyError::config("Invalid dimension");
        assert_eq!(err.to_string(), "Configuration error: Invalid dimension");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::SchemaVersionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Schema version mismatch: expected 2, found 1"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::dimension_mismatch(384, 768);
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 768"
        );
    }

    #[test]
    fn test_not_found_error_display() {
        let err = NotFoundError::noun("abc-123");
        assert_eq!(err.to_string(), "Noun not found: abc-123");
    }

    #[test]
    fn test_is_not_found() {
        let err: BrainyError = NotFoundError::noun("test").into();
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_is_validation() {
        let err: BrainyError = ValidationError::required_field("content").into();
        assert!(err.is_validation());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_vector_error_display() {
        let err = BrainyError::vector("HNSW insert failed");
        assert_eq!(err.to_string(), "Vector index error: HNSW insert failed");
        assert!(err.is_vector());
        assert!(!err.is_storage());
    }

    #[test]
    fn test_error_conversion_chain() {
        // Simulate a storage error propagating up
        fn inner() -> Result<()> {
            Err(StorageError::corrupted("test corruption"))?
        }

        let result = inner();
        assert!(result.is_err());
        assert!(result.unwrap_err().is_storage());
    }

    #[test]
    fn test_mode_violation_errors() {
        let ro = BrainyError::read_only("add_noun");
        assert!(ro.is_mode_violation());
        assert!(!ro.is_validation());

        let wo = BrainyError::write_only("search");
        assert!(wo.is_mode_violation());

        let frozen = BrainyError::frozen("cleanup_tick");
        assert!(frozen.is_mode_violation());
    }

    #[test]
    fn test_dimension_mismatch_top_level_is_validation() {
        let err = BrainyError::dimension_mismatch(384, 2);
        assert!(err.is_validation());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = BrainyError::timeout("get_noun", 1000);
        assert!(err.is_retryable());
        assert!(!err.is_mode_violation());
    }

    #[test]
    fn test_cancelled() {
        let err = BrainyError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retry_exhausted_wraps_source() {
        let err = BrainyError::RetryExhausted {
            attempts: 3,
            source: Box::new(BrainyError::Network("connection reset".into())),
        };
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_unknown_type_errors() {
        let err: BrainyError = ValidationError::unknown_noun_type("Widget").into();
        assert!(err.to_string().contains("noun"));
        let err: BrainyError = ValidationError::unknown_verb_type("Frobnicates").into();
        assert!(err.to_string().contains("verb"));
    }
}
