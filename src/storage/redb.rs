//! redb storage engine implementation.
//!
//! This module provides the primary storage backend for the Brainy database
//! core using [redb](https://docs.rs/redb), a pure Rust embedded key-value
//! store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//! - Zero external dependencies (pure Rust)
//!
//! # File Layout
//!
//! When you open a database at `./brainy.db`, redb creates:
//! - `./brainy.db` - Main database file
//! - `./brainy.db.lock` - Lock file for writer coordination (may not be visible)

use std::path::{Path, PathBuf};

use ::redb::{Database, ReadableTable, ReadableMultimapTable};
use tracing::{debug, info, instrument, warn};

use super::schema::{
    decode_entity_key, encode_change_log_key, encode_entity_key, encode_index_key, ChangeKind,
    ChangeLogEntry, DatabaseMetadata, CHANGE_LOG_TABLE, EMBEDDINGS_TABLE,
    METADATA_HASH_INDEX_TABLE, METADATA_SORTED_INDEX_TABLE, METADATA_TABLE, NOUNS_BY_TIME_TABLE,
    NOUNS_TABLE, SCHEMA_VERSION, STATISTICS_TABLE, VERBS_BY_SOURCE_TABLE, VERBS_BY_TARGET_TABLE,
    VERBS_BY_TYPE_TABLE, VERBS_TABLE,
};
use super::StorageEngine;
use crate::config::{Config, EmbeddingDimension};
use crate::error::{BrainyError, Result, StorageError, ValidationError};
use crate::noun::Noun;
use crate::types::{EntityId, NounId, Timestamp, VerbId};
use crate::verb::{Verb, VerbType};

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "db_metadata";

/// redb storage engine wrapper.
///
/// This struct holds the redb database handle and cached metadata.
/// It implements [`StorageEngine`] for use with `BrainyDb`.
///
/// # Thread Safety
///
/// `RedbStorage` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStorage {
    /// The redb database handle.
    db: Database,

    /// Cached database metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStorage {
    /// Opens or creates a database at the given path.
    ///
    /// If the database doesn't exist, it will be created and initialized
    /// with the configuration settings. If it exists, the configuration
    /// will be validated against the stored metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database file is corrupted
    /// - The database is locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match (for existing databases)
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening storage engine");

        let db = Self::create_database(path, config)?;

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates the redb database with appropriate settings.
    fn create_database(path: &Path, _config: &Config) -> Result<Database> {
        let builder = Database::builder();

        let db = builder.create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new database with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new database");

        let metadata = DatabaseMetadata::new(config.embedding_dimension);

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;

            let _ = write_txn.open_table(NOUNS_TABLE)?;
            let _ = write_txn.open_table(VERBS_TABLE)?;
            let _ = write_txn.open_table(EMBEDDINGS_TABLE)?;
            let _ = write_txn.open_multimap_table(NOUNS_BY_TIME_TABLE)?;
            let _ = write_txn.open_multimap_table(VERBS_BY_SOURCE_TABLE)?;
            let _ = write_txn.open_multimap_table(VERBS_BY_TARGET_TABLE)?;
            let _ = write_txn.open_multimap_table(VERBS_BY_TYPE_TABLE)?;
            let _ = write_txn.open_multimap_table(METADATA_HASH_INDEX_TABLE)?;
            let _ = write_txn.open_multimap_table(METADATA_SORTED_INDEX_TABLE)?;
            let _ = write_txn.open_table(CHANGE_LOG_TABLE)?;
            let _ = write_txn.open_table(STATISTICS_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = SCHEMA_VERSION,
            dimension = config.embedding_dimension.size(),
            "Database initialized"
        );

        Ok(Self { db, metadata, path })
    }

    /// Opens and validates an existing database.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing database");

        let read_txn = db.begin_read().map_err(StorageError::from)?;
        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing database metadata"))?;

            bincode::deserialize::<DatabaseMetadata>(metadata_bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };
        drop(read_txn);

        if metadata.schema_version != SCHEMA_VERSION {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(BrainyError::Storage(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        if metadata.embedding_dimension != config.embedding_dimension {
            warn!(
                expected = config.embedding_dimension.size(),
                found = metadata.embedding_dimension.size(),
                "Embedding dimension mismatch"
            );
            return Err(BrainyError::Validation(ValidationError::DimensionMismatch {
                expected: config.embedding_dimension.size(),
                got: metadata.embedding_dimension.size(),
            }));
        }

        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let metadata_bytes = bincode::serialize(&metadata)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            meta_table.insert(METADATA_KEY, metadata_bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(
            schema_version = metadata.schema_version,
            dimension = metadata.embedding_dimension.size(),
            "Database opened successfully"
        );

        Ok(Self { db, metadata, path })
    }

    /// Returns a reference to the underlying redb database.
    #[inline]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Returns the embedding dimension configured for this database.
    #[inline]
    pub fn embedding_dimension(&self) -> EmbeddingDimension {
        self.metadata.embedding_dimension
    }

    fn read_embedding(&self, key: &[u8; 17]) -> Result<Option<Vec<f32>>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(EMBEDDINGS_TABLE)?;
        let Some(bytes) = table.get(key).map_err(StorageError::from)? else {
            return Ok(None);
        };
        Ok(Some(bytes_to_f32_vec(bytes.value())))
    }
}

impl StorageEngine for RedbStorage {
    fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    #[instrument(skip(self))]
    fn close(self: Box<Self>) -> Result<()> {
        info!("Closing storage engine");
        drop(self.db);
        info!("Storage engine closed");
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    #[instrument(skip(self, noun), fields(id = %noun.id))]
    fn save_noun(&self, noun: &Noun) -> Result<()> {
        let key = *noun.id.as_bytes();
        let entity_key = encode_entity_key(EntityId::Noun(noun.id));
        let record_bytes =
            bincode::serialize(noun).map_err(|e| StorageError::serialization(e.to_string()))?;
        let embedding_bytes = f32_slice_to_bytes(&noun.embedding);
        let created_key = noun.metadata.lifecycle().created.to_be_bytes();

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut nouns = write_txn.open_table(NOUNS_TABLE)?;
            nouns.insert(&key, record_bytes.as_slice())?;

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.insert(&entity_key, embedding_bytes.as_slice())?;

            let mut by_time = write_txn.open_multimap_table(NOUNS_BY_TIME_TABLE)?;
            by_time.insert(&created_key, &key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn get_noun(&self, id: NounId) -> Result<Option<Noun>> {
        let key = *id.as_bytes();
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(NOUNS_TABLE)?;
        let Some(bytes) = table.get(&key).map_err(StorageError::from)? else {
            return Ok(None);
        };
        let mut noun: Noun = bincode::deserialize(bytes.value())
            .map_err(|e| StorageError::corrupted(format!("corrupt noun record: {e}")))?;
        drop(bytes);
        drop(table);
        drop(read_txn);

        let entity_key = encode_entity_key(EntityId::Noun(id));
        noun.embedding = self.read_embedding(&entity_key)?.unwrap_or_default();
        Ok(Some(noun))
    }

    #[instrument(skip(self))]
    fn delete_noun(&self, id: NounId) -> Result<bool> {
        let Some(existing) = self.get_noun(id)? else {
            return Ok(false);
        };
        let key = *id.as_bytes();
        let entity_key = encode_entity_key(EntityId::Noun(id));
        let created_key = existing.metadata.lifecycle().created.to_be_bytes();

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut nouns = write_txn.open_table(NOUNS_TABLE)?;
            nouns.remove(&key)?;

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.remove(&entity_key)?;

            let mut by_time = write_txn.open_multimap_table(NOUNS_BY_TIME_TABLE)?;
            by_time.remove(&created_key, &key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(true)
    }

    fn list_noun_ids(&self) -> Result<Vec<NounId>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(NOUNS_TABLE)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(StorageError::from)? {
            let (key, _) = entry.map_err(StorageError::from)?;
            ids.push(NounId::from_bytes(*key.value()));
        }
        Ok(ids)
    }

    #[instrument(skip(self, verb), fields(id = %verb.id))]
    fn save_verb(&self, verb: &Verb) -> Result<()> {
        let key = *verb.id.as_bytes();
        let entity_key = encode_entity_key(EntityId::Verb(verb.id));
        let record_bytes =
            bincode::serialize(verb).map_err(|e| StorageError::serialization(e.to_string()))?;
        let embedding_bytes = f32_slice_to_bytes(&verb.embedding);
        let source_key = *verb.source_id.as_bytes();
        let target_key = *verb.target_id.as_bytes();
        let type_str = verb.verb_type.as_str();

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut verbs = write_txn.open_table(VERBS_TABLE)?;
            verbs.insert(&key, record_bytes.as_slice())?;

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.insert(&entity_key, embedding_bytes.as_slice())?;

            let mut by_source = write_txn.open_multimap_table(VERBS_BY_SOURCE_TABLE)?;
            by_source.insert(&source_key, &key)?;

            let mut by_target = write_txn.open_multimap_table(VERBS_BY_TARGET_TABLE)?;
            by_target.insert(&target_key, &key)?;

            let mut by_type = write_txn.open_multimap_table(VERBS_BY_TYPE_TABLE)?;
            by_type.insert(type_str, &key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn get_verb(&self, id: VerbId) -> Result<Option<Verb>> {
        let key = *id.as_bytes();
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(VERBS_TABLE)?;
        let Some(bytes) = table.get(&key).map_err(StorageError::from)? else {
            return Ok(None);
        };
        let mut verb: Verb = bincode::deserialize(bytes.value())
            .map_err(|e| StorageError::corrupted(format!("corrupt verb record: {e}")))?;
        drop(bytes);
        drop(table);
        drop(read_txn);

        let entity_key = encode_entity_key(EntityId::Verb(id));
        verb.embedding = self.read_embedding(&entity_key)?.unwrap_or_default();
        Ok(Some(verb))
    }

    #[instrument(skip(self))]
    fn delete_verb(&self, id: VerbId) -> Result<bool> {
        let Some(existing) = self.get_verb(id)? else {
            return Ok(false);
        };
        let key = *id.as_bytes();
        let entity_key = encode_entity_key(EntityId::Verb(id));
        let source_key = *existing.source_id.as_bytes();
        let target_key = *existing.target_id.as_bytes();
        let type_str = existing.verb_type.as_str();

        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut verbs = write_txn.open_table(VERBS_TABLE)?;
            verbs.remove(&key)?;

            let mut embeddings = write_txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.remove(&entity_key)?;

            let mut by_source = write_txn.open_multimap_table(VERBS_BY_SOURCE_TABLE)?;
            by_source.remove(&source_key, &key)?;

            let mut by_target = write_txn.open_multimap_table(VERBS_BY_TARGET_TABLE)?;
            by_target.remove(&target_key, &key)?;

            let mut by_type = write_txn.open_multimap_table(VERBS_BY_TYPE_TABLE)?;
            by_type.remove(type_str, &key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(true)
    }

    fn list_verb_ids(&self) -> Result<Vec<VerbId>> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(VERBS_TABLE)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(StorageError::from)? {
            let (key, _) = entry.map_err(StorageError::from)?;
            ids.push(VerbId::from_bytes(*key.value()));
        }
        Ok(ids)
    }

    fn hash_index_insert(&self, field: &str, value_bytes: &[u8], entity: EntityId) -> Result<()> {
        let key = encode_index_key(field, value_bytes);
        let entity_key = encode_entity_key(entity);
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_multimap_table(METADATA_HASH_INDEX_TABLE)?;
            table.insert(key.as_slice(), &entity_key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn hash_index_remove(&self, field: &str, value_bytes: &[u8], entity: EntityId) -> Result<()> {
        let key = encode_index_key(field, value_bytes);
        let entity_key = encode_entity_key(entity);
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_multimap_table(METADATA_HASH_INDEX_TABLE)?;
            table.remove(key.as_slice(), &entity_key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn hash_index_lookup(&self, field: &str, value_bytes: &[u8]) -> Result<Vec<EntityId>> {
        let key = encode_index_key(field, value_bytes);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_multimap_table(METADATA_HASH_INDEX_TABLE)?;
        let mut ids = Vec::new();
        for entry in table.get(key.as_slice()).map_err(StorageError::from)? {
            let value = entry.map_err(StorageError::from)?;
            ids.push(decode_entity_key(value.value()));
        }
        Ok(ids)
    }

    fn sorted_index_insert(&self, field: &str, sortable_bytes: &[u8], entity: EntityId) -> Result<()> {
        let key = encode_index_key(field, sortable_bytes);
        let entity_key = encode_entity_key(entity);
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_multimap_table(METADATA_SORTED_INDEX_TABLE)?;
            table.insert(key.as_slice(), &entity_key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn sorted_index_remove(&self, field: &str, sortable_bytes: &[u8], entity: EntityId) -> Result<()> {
        let key = encode_index_key(field, sortable_bytes);
        let entity_key = encode_entity_key(entity);
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        {
            let mut table = write_txn.open_multimap_table(METADATA_SORTED_INDEX_TABLE)?;
            table.remove(key.as_slice(), &entity_key)?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn sorted_index_range(&self, field: &str, low: &[u8], high: &[u8]) -> Result<Vec<EntityId>> {
        let low_key = encode_index_key(field, low);
        let high_key = encode_index_key(field, high);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_multimap_table(METADATA_SORTED_INDEX_TABLE)?;
        let mut ids = Vec::new();
        for entry in table
            .range(low_key.as_slice()..high_key.as_slice())
            .map_err(StorageError::from)?
        {
            let (_, values) = entry.map_err(StorageError::from)?;
            for value in values {
                let value = value.map_err(StorageError::from)?;
                ids.push(decode_entity_key(value.value()));
            }
        }
        Ok(ids)
    }

    fn append_change_log(&self, entry: &ChangeLogEntry) -> Result<u64> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let sequence = {
            let mut stats = write_txn.open_table(STATISTICS_TABLE)?;
            let next = stats
                .get("change_log_sequence")
                .map_err(StorageError::from)?
                .map(|v| u64::from_be_bytes(v.value().try_into().unwrap_or_default()))
                .unwrap_or(0)
                + 1;
            stats.insert("change_log_sequence", next.to_be_bytes().as_slice())?;
            next
        };
        {
            let mut log = write_txn.open_table(CHANGE_LOG_TABLE)?;
            let key = encode_change_log_key(entry.at, sequence);
            let bytes = bincode::serialize(entry)
                .map_err(|e| StorageError::serialization(e.to_string()))?;
            log.insert(&key, bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;
        Ok(sequence)
    }

    fn get_changes_since(&self, since: Timestamp, limit: usize) -> Result<Vec<ChangeLogEntry>> {
        let start = encode_change_log_key(since, 0);
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(CHANGE_LOG_TABLE)?;
        let mut entries = Vec::new();
        for entry in table.range(&start..).map_err(StorageError::from)? {
            if entries.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(StorageError::from)?;
            let change: ChangeLogEntry = bincode::deserialize(value.value())
                .map_err(|e| StorageError::corrupted(format!("corrupt change log entry: {e}")))?;
            entries.push(change);
        }
        Ok(entries)
    }

    fn truncate_change_log_before(&self, before: Timestamp) -> Result<u64> {
        let end = encode_change_log_key(before, 0);
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let removed = {
            let mut table = write_txn.open_table(CHANGE_LOG_TABLE)?;
            let keys: Vec<[u8; 16]> = table
                .range(..&end)
                .map_err(StorageError::from)?
                .map(|entry| entry.map(|(k, _)| *k.value()))
                .collect::<std::result::Result<_, _>>()
                .map_err(StorageError::from)?;
            for key in &keys {
                table.remove(key)?;
            }
            keys.len() as u64
        };
        write_txn.commit().map_err(StorageError::from)?;
        Ok(removed)
    }

    fn get_statistic(&self, name: &str) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(StorageError::from)?;
        let table = read_txn.open_table(STATISTICS_TABLE)?;
        let value = table
            .get(name)
            .map_err(StorageError::from)?
            .map(|v| u64::from_be_bytes(v.value().try_into().unwrap_or_default()))
            .unwrap_or(0);
        Ok(value)
    }

    fn increment_statistic(&self, name: &str, delta: i64) -> Result<u64> {
        let write_txn = self.db.begin_write().map_err(StorageError::from)?;
        let new_value = {
            let mut table = write_txn.open_table(STATISTICS_TABLE)?;
            let current = table
                .get(name)
                .map_err(StorageError::from)?
                .map(|v| u64::from_be_bytes(v.value().try_into().unwrap_or_default()))
                .unwrap_or(0);
            let updated = if delta < 0 {
                current.saturating_sub(delta.unsigned_abs())
            } else {
                current.saturating_add(delta as u64)
            };
            table.insert(name, updated.to_be_bytes().as_slice())?;
            updated
        };
        write_txn.commit().map_err(StorageError::from)?;
        Ok(new_value)
    }
}

/// Converts a little-endian f32 byte buffer back into a vector.
fn bytes_to_f32_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Converts an f32 slice into its little-endian byte representation.
fn f32_slice_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

// Implement Send and Sync - redb::Database is Send + Sync
unsafe impl Send for RedbStorage {}
unsafe impl Sync for RedbStorage {}
