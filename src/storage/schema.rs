//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb storage engine.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing database, we check the version and fail if it doesn't match.
//! Migration support will be added in a future release.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "db_metadata" -> DatabaseMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ NOUNS_TABLE / VERBS_TABLE                                    │
//! │   Key: &[u8; 16] (NounId / VerbId as UUID bytes)             │
//! │   Value: &[u8] (bincode-serialized record, embedding elided) │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: &[u8; 17] (1-byte entity tag + 16-byte UUID)          │
//! │   Value: &[u8] (raw f32 bytes, dimension * 4)                │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ NOUNS_BY_TIME_TABLE (multimap)                               │
//! │   Key: &[u8; 8] (created_at, big-endian)                    │
//! │   Value: &[u8; 16] (NounId)                                  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ VERBS_BY_SOURCE_TABLE / VERBS_BY_TARGET_TABLE (multimap)      │
//! │   Key: &[u8; 16] (NounId)                                    │
//! │   Value: &[u8; 16] (VerbId)                                  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_HASH_INDEX_TABLE / METADATA_SORTED_INDEX_TABLE       │
//! │   Key: &[u8] (field-name-prefixed encoded value)             │
//! │   Value: &[u8; 17] (entity key: tag + UUID)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::types::{EntityId, NounId, Timestamp, VerbId};

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum size in bytes of a noun or verb's metadata document (§3/§4.2).
pub const MAX_METADATA_SIZE: usize = 100 * 1024;

/// Maximum length of a single string metadata value.
pub const MAX_METADATA_STRING_LENGTH: usize = 10 * 1024;

/// Maximum number of keys in a metadata document (excluding `_brainy`).
pub const MAX_METADATA_KEYS: usize = 100;

/// Maximum length of a metadata key.
pub const MAX_METADATA_KEY_LENGTH: usize = 200;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for database-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Nouns table.
///
/// Key: NounId as 16-byte UUID
/// Value: bincode-serialized `Noun` (embedding elided, stored separately)
pub const NOUNS_TABLE: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("nouns");

/// Verbs table.
///
/// Key: VerbId as 16-byte UUID
/// Value: bincode-serialized `Verb` (embedding elided, stored separately)
pub const VERBS_TABLE: TableDefinition<&[u8; 16], &[u8]> = TableDefinition::new("verbs");

/// Embeddings table, shared by nouns and verbs (§9: one HNSW graph for both).
///
/// Key: 17-byte entity key (1-byte tag + 16-byte UUID), see [`encode_entity_key`]
/// Value: raw f32 bytes (dimension * 4 bytes)
pub const EMBEDDINGS_TABLE: TableDefinition<&[u8; 17], &[u8]> =
    TableDefinition::new("embeddings");

/// Index: nouns ordered by creation time.
///
/// Enables "most recently added nouns" style queries without a full scan.
/// Key: `_brainy.created` big-endian bytes, Value: NounId bytes.
pub const NOUNS_BY_TIME_TABLE: MultimapTableDefinition<&[u8; 8], &[u8; 16]> =
    MultimapTableDefinition::new("nouns_by_time");

/// Index: verbs outgoing from a noun (adjacency, forward direction).
pub const VERBS_BY_SOURCE_TABLE: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("verbs_by_source");

/// Index: verbs incoming to a noun (adjacency, reverse direction).
pub const VERBS_BY_TARGET_TABLE: MultimapTableDefinition<&[u8; 16], &[u8; 16]> =
    MultimapTableDefinition::new("verbs_by_target");

/// Index: verbs grouped by their type.
///
/// Key: verb type tag (see `verb::VerbType::as_str`), Value: VerbId bytes.
pub const VERBS_BY_TYPE_TABLE: MultimapTableDefinition<&str, &[u8; 16]> =
    MultimapTableDefinition::new("verbs_by_type");

/// Metadata hash index (§4.2): exact-match lookups on scalar fields.
///
/// Key: `field_name` + NUL + value bytes, Value: 17-byte entity key.
pub const METADATA_HASH_INDEX_TABLE: MultimapTableDefinition<&[u8], &[u8; 17]> =
    MultimapTableDefinition::new("metadata_hash_index");

/// Metadata sorted index (§4.2): range queries on orderable fields.
///
/// Key: `field_name` + NUL + order-preserving-encoded value, Value: entity key.
pub const METADATA_SORTED_INDEX_TABLE: MultimapTableDefinition<&[u8], &[u8; 17]> =
    MultimapTableDefinition::new("metadata_sorted_index");

/// Change log (§4.4, §4.6): append-only record of every mutation, used to
/// invalidate stale cursors and to drive the WAL checkpoint watermark.
///
/// Key: `(timestamp_be, sequence_be)` 16 bytes, Value: bincode `ChangeLogEntry`.
pub const CHANGE_LOG_TABLE: TableDefinition<&[u8; 16], &[u8]> =
    TableDefinition::new("change_log");

/// Database-wide counters (noun count, verb count, tombstone count, ...).
///
/// Key: counter name, Value: bincode `u64`.
pub const STATISTICS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("statistics");

// ============================================================================
// Database Metadata
// ============================================================================

/// Database metadata stored in the metadata table under `"db_metadata"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Embedding dimension configured for this database.
    ///
    /// Once set, this cannot be changed without recreating the database.
    pub embedding_dimension: EmbeddingDimension,

    /// Timestamp when the database was created.
    pub created_at: Timestamp,

    /// Last time the database was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    /// Creates new metadata for a fresh database.
    pub fn new(embedding_dimension: EmbeddingDimension) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

/// A single entry in the append-only change log.
///
/// Cursors embed the log's tail sequence number at the time the query ran;
/// if the tail has advanced past it on a later page fetch, the query engine
/// treats the cursor as invalidated (§9, cursor stability decision).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub entity: EntityId,
    pub kind: ChangeKind,
    pub at: Timestamp,
}

/// The kind of mutation recorded in the change log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Updated,
    SoftDeleted,
    HardDeleted,
}

// ============================================================================
// Key Encoding Helpers
// ============================================================================

const NOUN_TAG: u8 = 0;
const VERB_TAG: u8 = 1;

/// Encodes an [`EntityId`] as a 17-byte key (1-byte tag + 16-byte UUID) for
/// use in the embeddings table and the metadata indexes.
#[inline]
pub fn encode_entity_key(id: EntityId) -> [u8; 17] {
    let mut key = [0u8; 17];
    match id {
        EntityId::Noun(noun_id) => {
            key[0] = NOUN_TAG;
            key[1..].copy_from_slice(noun_id.as_bytes());
        }
        EntityId::Verb(verb_id) => {
            key[0] = VERB_TAG;
            key[1..].copy_from_slice(verb_id.as_bytes());
        }
    }
    key
}

/// Decodes a 17-byte entity key produced by [`encode_entity_key`].
///
/// # Panics
/// Panics if the tag byte is neither `0` nor `1`. The tag is controlled
/// entirely by this module, so a mismatch indicates on-disk corruption.
#[inline]
pub fn decode_entity_key(key: &[u8; 17]) -> EntityId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[1..]);
    match key[0] {
        NOUN_TAG => EntityId::Noun(NounId::from_bytes(bytes)),
        VERB_TAG => EntityId::Verb(VerbId::from_bytes(bytes)),
        other => panic!("corrupt entity key: unknown tag {other}"),
    }
}

/// Builds a hash/sorted index key: `field_name` + NUL separator + value bytes.
///
/// The NUL separator is safe because metadata field names are validated to
/// exclude NUL bytes (see `metadata::validation`).
#[inline]
pub fn encode_index_key(field: &str, value_bytes: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + value_bytes.len());
    key.extend_from_slice(field.as_bytes());
    key.push(0);
    key.extend_from_slice(value_bytes);
    key
}

/// Returns the inclusive range start for scanning all index entries under
/// `field`, regardless of value.
#[inline]
pub fn index_field_range_start(field: &str) -> Vec<u8> {
    encode_index_key(field, &[])
}

/// Returns an exclusive range end for scanning all index entries under
/// `field`: the field name's key prefix incremented by one.
#[inline]
pub fn index_field_range_end(field: &str) -> Vec<u8> {
    let mut key = field.as_bytes().to_vec();
    key.push(1);
    key
}

/// Encodes a `(timestamp_be, sequence_be)` change-log key.
#[inline]
pub fn encode_change_log_key(timestamp: Timestamp, sequence: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&timestamp.to_be_bytes());
    key[8..].copy_from_slice(&sequence.to_be_bytes());
    key
}
