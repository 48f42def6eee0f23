//! Storage layer abstractions for the Brainy database core.
//!
//! This module provides a trait-based abstraction over the storage engine,
//! allowing different backends to be used (e.g., redb, mock for testing).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BrainyDb                                │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageEngine     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                    ▲         ▲                              │
//! │                    │         │                              │
//! │         ┌─────────┴─┐   ┌───┴─────────┐                    │
//! │         │RedbStorage│   │ MockStorage │                    │
//! │         └───────────┘   └─────────────┘                    │
//! │           (prod)           (test)                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod redb;
pub mod schema;

pub use self::redb::RedbStorage;
pub use schema::{ChangeKind, ChangeLogEntry, DatabaseMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::noun::Noun;
use crate::types::{EntityId, NounId, Timestamp, VerbId};
use crate::verb::Verb;

/// Storage engine trait for the Brainy database core.
///
/// This trait defines the contract that any storage backend must implement.
/// The primary implementation is [`RedbStorage`], but other implementations
/// can be created for testing or alternative backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow the database to be shared
/// across threads. The engine handles internal synchronization.
pub trait StorageEngine: Send + Sync {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the database metadata.
    fn metadata(&self) -> &DatabaseMetadata;

    /// Closes the storage engine, flushing any pending writes.
    fn close(self: Box<Self>) -> Result<()>;

    /// Returns the path to the database file, if applicable.
    fn path(&self) -> Option<&Path>;

    // =========================================================================
    // Noun storage
    // =========================================================================

    /// Saves a noun and its embedding atomically: writes `NOUNS_TABLE`,
    /// `EMBEDDINGS_TABLE`, and the `NOUNS_BY_TIME_TABLE` index entry in a
    /// single transaction. Overwrites any existing record with the same id.
    fn save_noun(&self, noun: &Noun) -> Result<()>;

    /// Retrieves a noun by id, including its embedding. Returns `None` if
    /// absent. Does not filter on `_brainy.deleted` — that is the facade's
    /// job (§4.7); storage returns whatever is on disk.
    fn get_noun(&self, id: NounId) -> Result<Option<Noun>>;

    /// Permanently removes a noun, its embedding, and its by-time index
    /// entry. Returns `true` if it existed. Does not cascade-delete
    /// incident verbs; the cleanup coordinator (§4.8) is responsible for
    /// that ordering.
    fn delete_noun(&self, id: NounId) -> Result<bool>;

    /// Lists every noun id in storage, for rebuilding in-memory indexes on
    /// open.
    fn list_noun_ids(&self) -> Result<Vec<NounId>>;

    // =========================================================================
    // Verb storage
    // =========================================================================

    /// Saves a verb and its embedding atomically: writes `VERBS_TABLE`,
    /// `EMBEDDINGS_TABLE`, and the source/target/type adjacency indexes in a
    /// single transaction.
    fn save_verb(&self, verb: &Verb) -> Result<()>;

    /// Retrieves a verb by id, including its embedding.
    fn get_verb(&self, id: VerbId) -> Result<Option<Verb>>;

    /// Permanently removes a verb, its embedding, and its adjacency index
    /// entries. Returns `true` if it existed.
    fn delete_verb(&self, id: VerbId) -> Result<bool>;

    /// Lists every verb id in storage, for rebuilding the graph store and
    /// HNSW index on open.
    fn list_verb_ids(&self) -> Result<Vec<VerbId>>;

    // =========================================================================
    // Metadata secondary index
    // =========================================================================

    /// Inserts a hash-index entry for `(field, value_bytes)` → `entity`.
    fn hash_index_insert(&self, field: &str, value_bytes: &[u8], entity: EntityId) -> Result<()>;

    /// Removes a hash-index entry.
    fn hash_index_remove(&self, field: &str, value_bytes: &[u8], entity: EntityId) -> Result<()>;

    /// Returns every entity indexed under `(field, value_bytes)`.
    fn hash_index_lookup(&self, field: &str, value_bytes: &[u8]) -> Result<Vec<EntityId>>;

    /// Inserts a sorted-index entry for `(field, sortable_bytes)` → `entity`.
    fn sorted_index_insert(&self, field: &str, sortable_bytes: &[u8], entity: EntityId) -> Result<()>;

    /// Removes a sorted-index entry.
    fn sorted_index_remove(&self, field: &str, sortable_bytes: &[u8], entity: EntityId) -> Result<()>;

    /// Returns every entity whose `field` value's sortable encoding falls in
    /// `[low, high)`.
    fn sorted_index_range(&self, field: &str, low: &[u8], high: &[u8]) -> Result<Vec<EntityId>>;

    // =========================================================================
    // Change log
    // =========================================================================

    /// Appends a change-log entry, returning its assigned sequence number.
    fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<u64>;

    /// Returns change-log entries at or after `since`, oldest first, up to
    /// `limit` entries. Used to detect stale query cursors (§9).
    fn get_changes_since(&self, since: Timestamp, limit: usize) -> Result<Vec<ChangeLogEntry>>;

    /// Truncates change-log entries older than `before` (WAL/log checkpoint
    /// housekeeping).
    fn truncate_change_log_before(&self, before: Timestamp) -> Result<u64>;

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Reads a named counter, defaulting to 0 if never set.
    fn get_statistic(&self, name: &str) -> Result<u64>;

    /// Atomically adds `delta` to a named counter and returns the new value.
    /// `delta` may be negative (saturates at 0).
    fn increment_statistic(&self, name: &str, delta: i64) -> Result<u64>;
}

/// Opens a storage engine at the given path.
///
/// This is a convenience function that creates a [`RedbStorage`] instance.
/// For more control, use `RedbStorage::open()` directly.
///
/// # Errors
///
/// Returns an error if:
/// - The database file is corrupted
/// - The database is locked by another process
/// - Schema version doesn't match
/// - Embedding dimension doesn't match (for existing databases)
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<Box<dyn StorageEngine>> {
    let storage = RedbStorage::open(path, config)?;
    Ok(Box::new(storage))
}
