//! The database facade (§4.9): owns the lifecycles of the storage engine,
//! HNSW index, metadata index, graph store, unified cache, WAL, and
//! cleanup coordinator, and exposes the public API surface (§6).
//!
//! Every mutating method follows the same order: validate input, acquire
//! the write guard, append to the WAL, write to storage, then update the
//! derived in-memory state (HNSW index, secondary indexes, graph
//! adjacency). The first three steps are atomic with respect to a crash;
//! the last is best-effort and logged rather than propagated, since a
//! reader briefly observing storage-but-not-index state is preferable to
//! losing a durable write over a derived-state hiccup (§7).

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::bridge::IdBridge;
use crate::cache::UnifiedCache;
use crate::cleanup::{self, deleted_marker_bytes, CleanupContext, CleanupReport, DELETED_INDEX_FIELD};
use crate::config::Config;
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::error::{BrainyError, NotFoundError, Result};
use crate::graph::GraphStore;
use crate::hooks::BrainyHook;
use crate::metadata::index::{
    encode_hashable_value, encode_sortable_value, flatten_leaves, index_target, IndexTarget, DOT_PATH_DEPTH_LIMIT,
};
use crate::metadata::Metadata;
use crate::noun::{validate_new_noun, NewNoun, Noun, NounUpdate};
use crate::query::{self, Query, QueryContext, QueryOptions, QueryPage, QueryTarget};
use crate::storage::{open_storage, ChangeKind, ChangeLogEntry, StorageEngine};
use crate::types::{EntityId, NounId, Timestamp, VerbId};
use crate::vector::{HnswIndex, VectorIndex};
use crate::verb::{validate_new_verb, NewVerb, Verb, DEFAULT_VERB_WEIGHT};
use crate::wal::{hash_payload, Wal, WalOp};

#[derive(Default)]
struct ModeState {
    read_only: bool,
    write_only: bool,
    frozen: bool,
    allow_direct_reads: bool,
}

/// Aggregate counts returned by [`BrainyDb::get_statistics`].
#[derive(Clone, Debug)]
pub struct Statistics {
    pub noun_count: usize,
    pub verb_count: usize,
    pub active_vector_count: usize,
    pub graph_edge_count: usize,
    pub cache_entries: Option<usize>,
    pub cache_bytes: Option<u64>,
}

/// Tuning for [`BrainyDb::get_statistics`]; cache figures are skipped
/// unless requested, since walking the cache holds its lock.
#[derive(Clone, Debug, Default)]
pub struct StatisticsOptions {
    pub include_cache: bool,
}

/// The embedded hybrid vector+graph database core.
///
/// Owns every component (`storage`, `vectors`, `graph`, `bridge`, `cache`,
/// `wal`) and is the sole entry point the public API is defined on. A
/// single [`RwLock`] (`guard`) serializes mutations against the in-memory
/// derived state; storage provides its own internal transaction
/// isolation (§5).
pub struct BrainyDb {
    storage: Box<dyn StorageEngine>,
    embedding: Box<dyn EmbeddingService>,
    config: Config,
    vectors: HnswIndex,
    graph: GraphStore,
    bridge: IdBridge,
    cache: UnifiedCache,
    wal: Wal,
    guard: RwLock<()>,
    mode: RwLock<ModeState>,
    hooks: Vec<Arc<dyn BrainyHook>>,
}

impl BrainyDb {
    /// Opens (or creates) a database at `path` with no hooks registered.
    /// Equivalent to `open_with_hooks(path, config, Vec::new())`.
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        Self::open_with_hooks(path, config, Vec::new())
    }

    /// Opens (or creates) a database at `path`, rebuilding the HNSW index
    /// and graph store from storage. Embeddings in storage are the source
    /// of truth; the vector index is always rebuilt fresh rather than
    /// loaded from a sidecar (§4.1).
    ///
    /// `hooks` are wired once here and never mutated afterward (§9).
    #[instrument(skip(config, hooks), fields(path = %path.as_ref().display()))]
    pub fn open_with_hooks(path: impl AsRef<Path>, config: Config, hooks: Vec<Arc<dyn BrainyHook>>) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();

        let storage = open_storage(path, &config)?;
        let embedding = create_embedding_service(&config)?;
        let vectors = HnswIndex::new(config.dimension(), &config.hnsw);
        let graph = GraphStore::new();
        let bridge = IdBridge::new();
        let cache = UnifiedCache::new(config.cache.clone());
        let wal = Wal::open(wal_path(path), config.wal.enabled && !config.ephemeral)?;

        Self::rebuild_derived_state(storage.as_ref(), &vectors, &graph, &bridge)?;
        if let Some(last) = wal.pending_records()?.last() {
            if let Err(e) = wal.checkpoint(last.seq) {
                warn!(error = %e, "failed to checkpoint WAL after open-time rebuild");
            }
        }

        info!(nouns = bridge.len(), edges = graph.len(), "database opened");

        Ok(Self {
            storage,
            embedding,
            config,
            vectors,
            graph,
            bridge,
            cache,
            wal,
            guard: RwLock::new(()),
            mode: RwLock::new(ModeState::default()),
            hooks,
        })
    }

    /// Replays every stored noun and verb into the HNSW index, graph
    /// adjacency, and id bridge. The vector index has no durable form of
    /// its own (§4.1), so this is the only path that populates it.
    fn rebuild_derived_state(
        storage: &dyn StorageEngine,
        vectors: &HnswIndex,
        graph: &GraphStore,
        bridge: &IdBridge,
    ) -> Result<()> {
        for id in storage.list_noun_ids()? {
            let Some(noun) = storage.get_noun(id)? else { continue };
            let key = bridge.key_for(EntityId::Noun(id));
            vectors.insert(key, &noun.embedding)?;
            if noun.is_deleted() {
                vectors.delete(key)?;
            }
        }
        for id in storage.list_verb_ids()? {
            let Some(verb) = storage.get_verb(id)? else { continue };
            let key = bridge.key_for(EntityId::Verb(id));
            vectors.insert(key, &verb.embedding)?;
            if verb.is_deleted() {
                vectors.delete(key)?;
            }
            graph.insert(verb.id, verb.source_id, verb.target_id, verb.verb_type);
        }
        Ok(())
    }

    /// Closes the database, flushing storage. The HNSW index is never
    /// persisted as a loadable graph, so there is nothing further to save
    /// here; the next `open` rebuilds it from storage.
    pub fn shut_down(self) -> Result<()> {
        self.storage.close()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata(&self) -> &crate::storage::DatabaseMetadata {
        self.storage.metadata()
    }

    pub fn embedding_dimension(&self) -> usize {
        self.config.dimension()
    }

    // =====================================================================
    // Mode control (§5)
    // =====================================================================

    /// Enables or disables read-only mode. Mutually exclusive with
    /// write-only: enabling this clears write-only.
    pub fn set_read_only(&self, enabled: bool) {
        let mut mode = self.mode.write().unwrap();
        mode.read_only = enabled;
        if enabled {
            mode.write_only = false;
        }
    }

    /// Enables or disables write-only mode. `allow_direct_reads` governs
    /// whether `get_noun`/`get_verb` still work while fused search is
    /// rejected.
    pub fn set_write_only(&self, enabled: bool, allow_direct_reads: bool) {
        let mut mode = self.mode.write().unwrap();
        mode.write_only = enabled;
        mode.allow_direct_reads = allow_direct_reads;
        if enabled {
            mode.read_only = false;
        }
    }

    /// Enables or disables frozen mode: rejects mutations and suspends
    /// background cleanup/WAL truncation, independent of read/write-only.
    pub fn set_frozen(&self, enabled: bool) {
        self.mode.write().unwrap().frozen = enabled;
    }

    fn check_mutation_allowed(&self, operation: &str) -> Result<()> {
        let mode = self.mode.read().unwrap();
        if mode.frozen {
            return Err(BrainyError::frozen(operation));
        }
        if mode.read_only {
            return Err(BrainyError::read_only(operation));
        }
        Ok(())
    }

    fn check_search_allowed(&self, operation: &str) -> Result<()> {
        if self.mode.read().unwrap().write_only {
            return Err(BrainyError::write_only(operation));
        }
        Ok(())
    }

    fn check_direct_read_allowed(&self, operation: &str) -> Result<()> {
        let mode = self.mode.read().unwrap();
        if mode.write_only && !mode.allow_direct_reads {
            return Err(BrainyError::write_only(operation));
        }
        Ok(())
    }

    // =====================================================================
    // Derived-state helpers
    // =====================================================================

    /// Replaces `entity`'s vector index entry: tombstones whatever key it
    /// held before (if any) and inserts the new embedding under a fresh
    /// key. HNSW has no in-place update, so an update is a soft-delete of
    /// the old point plus an insert of the new one (§4.1).
    fn reindex_vector(&self, entity: EntityId, embedding: &[f32]) {
        if let Some(old_key) = self.bridge.lookup(entity) {
            if let Err(e) = self.vectors.delete(old_key) {
                warn!(entity = %entity, error = %e, "failed to tombstone previous vector entry");
            }
            self.bridge.remove(entity);
        }
        let key = self.bridge.key_for(entity);
        if let Err(e) = self.vectors.insert(key, embedding) {
            warn!(entity = %entity, error = %e, "failed to index vector; entity stored but not yet searchable");
        }
    }

    fn index_properties(&self, entity: EntityId, metadata: &Metadata) {
        let mut leaves = Vec::new();
        for (field, value) in metadata.properties() {
            flatten_leaves(field, value, DOT_PATH_DEPTH_LIMIT, &mut leaves);
        }
        for (field, value) in &leaves {
            match index_target(value) {
                IndexTarget::HashAndSorted => {
                    if let Err(e) = self.storage.hash_index_insert(field, &encode_hashable_value(value), entity) {
                        warn!(entity = %entity, field, error = %e, "failed to hash-index property");
                    }
                    if let Some(bytes) = encode_sortable_value(value) {
                        if let Err(e) = self.storage.sorted_index_insert(field, &bytes, entity) {
                            warn!(entity = %entity, field, error = %e, "failed to sorted-index property");
                        }
                    }
                }
                IndexTarget::HashOnly => {
                    if let Err(e) = self.storage.hash_index_insert(field, &encode_hashable_value(value), entity) {
                        warn!(entity = %entity, field, error = %e, "failed to hash-index property");
                    }
                }
                IndexTarget::None => {}
            }
        }
    }

    fn unindex_properties(&self, entity: EntityId, metadata: &Metadata) {
        let mut leaves = Vec::new();
        for (field, value) in metadata.properties() {
            flatten_leaves(field, value, DOT_PATH_DEPTH_LIMIT, &mut leaves);
        }
        for (field, value) in &leaves {
            match index_target(value) {
                IndexTarget::HashAndSorted => {
                    if let Err(e) = self.storage.hash_index_remove(field, &encode_hashable_value(value), entity) {
                        warn!(entity = %entity, field, error = %e, "failed to remove hash-index entry");
                    }
                    if let Some(bytes) = encode_sortable_value(value) {
                        if let Err(e) = self.storage.sorted_index_remove(field, &bytes, entity) {
                            warn!(entity = %entity, field, error = %e, "failed to remove sorted-index entry");
                        }
                    }
                }
                IndexTarget::HashOnly => {
                    if let Err(e) = self.storage.hash_index_remove(field, &encode_hashable_value(value), entity) {
                        warn!(entity = %entity, field, error = %e, "failed to remove hash-index entry");
                    }
                }
                IndexTarget::None => {}
            }
        }
    }

    fn record_change(&self, entity: EntityId, kind: ChangeKind, at: Timestamp) {
        let entry = ChangeLogEntry { entity, kind, at };
        if let Err(e) = self.storage.append_change_log(&entry) {
            warn!(entity = %entity, error = %e, "failed to append change log entry");
        }
    }

    fn maybe_checkpoint_wal(&self, seq: u64) {
        if !self.wal.is_enabled() || seq == 0 {
            return;
        }
        let batch = self.config.wal.checkpoint_batch.max(1) as u64;
        if seq % batch == 0 {
            if let Err(e) = self.wal.checkpoint(seq) {
                warn!(seq, error = %e, "WAL checkpoint failed");
            }
        }
    }

    fn query_context(&self) -> QueryContext<'_> {
        QueryContext {
            storage: self.storage.as_ref(),
            vectors: &self.vectors,
            graph: &self.graph,
            bridge: &self.bridge,
        }
    }

    // =====================================================================
    // Noun CRUD (§6)
    // =====================================================================

    #[instrument(skip(self, new_noun))]
    pub fn add_noun(&self, mut new_noun: NewNoun) -> Result<NounId> {
        self.check_mutation_allowed("add_noun")?;
        for hook in &self.hooks {
            hook.on_before_add_noun(&mut new_noun);
        }
        validate_new_noun(&new_noun)?;

        let embedding = match new_noun.vector {
            Some(v) => v,
            None => {
                let content = new_noun
                    .content
                    .as_deref()
                    .ok_or_else(|| BrainyError::embedding("add_noun requires a vector or content"))?;
                self.embedding.embed(content)?
            }
        };
        self.embedding.validate_embedding(&embedding)?;

        let _guard = self.guard.write().unwrap();
        let now = Timestamp::now();
        let id = NounId::new();
        let metadata = Metadata::new(new_noun.properties, now);
        metadata.validate()?;
        let noun = Noun { id, noun_type: new_noun.noun_type, embedding: embedding.clone(), metadata };

        let seq = self.wal.append(WalOp::AddNoun, EntityId::Noun(id), hash_vector(&embedding))?;
        self.storage.save_noun(&noun)?;

        self.index_properties(EntityId::Noun(id), &noun.metadata);
        self.reindex_vector(EntityId::Noun(id), &embedding);
        self.record_change(EntityId::Noun(id), ChangeKind::Added, now);
        self.maybe_checkpoint_wal(seq);

        info!(noun = %id, "noun added");
        Ok(id)
    }

    /// Returns `id`'s noun, or `None` if it doesn't exist or is
    /// soft-deleted (§4.7/§8: a deleted noun reads back as absent until
    /// [`Self::restore_noun`] brings it back).
    pub fn get_noun(&self, id: NounId) -> Result<Option<Noun>> {
        self.check_direct_read_allowed("get_noun")?;
        let _guard = self.guard.read().unwrap();
        Ok(self.storage.get_noun(id)?.filter(|noun| !noun.is_deleted()))
    }

    #[instrument(skip(self, update))]
    pub fn update_noun(&self, id: NounId, update: NounUpdate) -> Result<()> {
        self.check_mutation_allowed("update_noun")?;

        let new_embedding = match (update.vector, update.content) {
            (Some(v), _) => Some(v),
            (None, Some(content)) => Some(self.embedding.embed(&content)?),
            (None, None) => None,
        };
        if let Some(ref e) = new_embedding {
            self.embedding.validate_embedding(e)?;
        }

        let _guard = self.guard.write().unwrap();
        let mut noun = self.storage.get_noun(id)?.ok_or_else(|| NotFoundError::noun(id))?;
        let old_metadata = noun.metadata.clone();
        let now = Timestamp::now();

        if let Some(props) = update.properties {
            noun.metadata.merge(props, now);
        }
        noun.metadata.validate()?;
        if let Some(embedding) = new_embedding {
            noun.embedding = embedding;
        }

        let seq = self.wal.append(WalOp::UpdateNoun, EntityId::Noun(id), hash_vector(&noun.embedding))?;
        self.storage.save_noun(&noun)?;

        self.unindex_properties(EntityId::Noun(id), &old_metadata);
        self.index_properties(EntityId::Noun(id), &noun.metadata);
        self.reindex_vector(EntityId::Noun(id), &noun.embedding);
        self.record_change(EntityId::Noun(id), ChangeKind::Updated, now);
        self.maybe_checkpoint_wal(seq);
        Ok(())
    }

    /// Merges `properties` into a noun's metadata without touching its
    /// vector or re-embedding it; cheaper than [`Self::update_noun`] when
    /// only caller properties change.
    #[instrument(skip(self, properties))]
    pub fn update_noun_metadata(&self, id: NounId, properties: Map<String, Value>) -> Result<()> {
        self.check_mutation_allowed("update_noun_metadata")?;
        let _guard = self.guard.write().unwrap();
        let mut noun = self.storage.get_noun(id)?.ok_or_else(|| NotFoundError::noun(id))?;
        let old_metadata = noun.metadata.clone();
        let now = Timestamp::now();

        noun.metadata.merge(properties, now);
        noun.metadata.validate()?;

        let seq = self.wal.append(WalOp::UpdateNoun, EntityId::Noun(id), hash_metadata(&noun.metadata))?;
        self.storage.save_noun(&noun)?;

        self.unindex_properties(EntityId::Noun(id), &old_metadata);
        self.index_properties(EntityId::Noun(id), &noun.metadata);
        self.record_change(EntityId::Noun(id), ChangeKind::Updated, now);
        self.maybe_checkpoint_wal(seq);
        Ok(())
    }

    /// Soft-deletes a noun: marks `_brainy.deleted`, tombstones its
    /// vector, and tracks it in the reserved deleted-set index. Physical
    /// removal is the cleanup coordinator's job (§4.8).
    #[instrument(skip(self))]
    pub fn delete_noun(&self, id: NounId) -> Result<()> {
        self.check_mutation_allowed("delete_noun")?;
        let _guard = self.guard.write().unwrap();
        let mut noun = self.storage.get_noun(id)?.ok_or_else(|| NotFoundError::noun(id))?;
        if noun.is_deleted() {
            return Ok(());
        }
        let now = Timestamp::now();
        noun.metadata.mark_deleted(now);

        let seq = self.wal.append(WalOp::DeleteNoun, EntityId::Noun(id), hash_metadata(&noun.metadata))?;
        self.storage.save_noun(&noun)?;

        if let Err(e) =
            self.storage.hash_index_insert(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Noun(id))
        {
            warn!(noun = %id, error = %e, "failed to mark noun in deleted-set index");
        }
        if let Some(key) = self.bridge.lookup(EntityId::Noun(id)) {
            if let Err(e) = self.vectors.delete(key) {
                warn!(noun = %id, error = %e, "failed to tombstone deleted noun's vector");
            }
        }
        self.record_change(EntityId::Noun(id), ChangeKind::SoftDeleted, now);
        self.maybe_checkpoint_wal(seq);
        info!(noun = %id, "noun soft-deleted");
        Ok(())
    }

    /// Reverses a soft-delete, re-activating the noun's vector under a
    /// fresh HNSW key.
    #[instrument(skip(self))]
    pub fn restore_noun(&self, id: NounId) -> Result<()> {
        self.check_mutation_allowed("restore_noun")?;
        let _guard = self.guard.write().unwrap();
        let mut noun = self.storage.get_noun(id)?.ok_or_else(|| NotFoundError::noun(id))?;
        if !noun.is_deleted() {
            return Ok(());
        }
        let now = Timestamp::now();
        noun.metadata.mark_restored(now);

        let seq = self.wal.append(WalOp::UpdateNoun, EntityId::Noun(id), hash_metadata(&noun.metadata))?;
        self.storage.save_noun(&noun)?;

        if let Err(e) =
            self.storage.hash_index_remove(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Noun(id))
        {
            warn!(noun = %id, error = %e, "failed to clear noun's deleted-set index entry");
        }
        self.reindex_vector(EntityId::Noun(id), &noun.embedding);
        self.record_change(EntityId::Noun(id), ChangeKind::Updated, now);
        self.maybe_checkpoint_wal(seq);
        Ok(())
    }

    // =====================================================================
    // Verb CRUD (§6)
    // =====================================================================

    #[instrument(skip(self, new_verb))]
    pub fn add_verb(&self, mut new_verb: NewVerb) -> Result<VerbId> {
        self.check_mutation_allowed("add_verb")?;
        for hook in &self.hooks {
            hook.on_before_add_verb(&mut new_verb);
        }
        validate_new_verb(&new_verb)?;
        if self.storage.get_noun(new_verb.source_id)?.is_none() {
            return Err(NotFoundError::noun(new_verb.source_id).into());
        }
        if self.storage.get_noun(new_verb.target_id)?.is_none() {
            return Err(NotFoundError::noun(new_verb.target_id).into());
        }

        let embedding = match new_verb.vector {
            Some(v) => v,
            None => {
                let text = format!(
                    "{} relationship with {}",
                    new_verb.verb_type.as_str(),
                    serde_json::to_string(&new_verb.properties).unwrap_or_default()
                );
                self.embedding.embed(&text)?
            }
        };
        self.embedding.validate_embedding(&embedding)?;

        let _guard = self.guard.write().unwrap();
        let now = Timestamp::now();
        let id = VerbId::new();
        let metadata = Metadata::new(new_verb.properties, now);
        metadata.validate()?;
        let verb = Verb {
            id,
            source_id: new_verb.source_id,
            target_id: new_verb.target_id,
            verb_type: new_verb.verb_type,
            weight: new_verb.weight.unwrap_or(DEFAULT_VERB_WEIGHT),
            confidence: new_verb.confidence,
            embedding: embedding.clone(),
            metadata,
        };

        let seq = self.wal.append(WalOp::AddVerb, EntityId::Verb(id), hash_vector(&embedding))?;
        self.storage.save_verb(&verb)?;

        self.index_properties(EntityId::Verb(id), &verb.metadata);
        self.reindex_vector(EntityId::Verb(id), &embedding);
        self.graph.insert(id, verb.source_id, verb.target_id, verb.verb_type);
        self.record_change(EntityId::Verb(id), ChangeKind::Added, now);
        self.maybe_checkpoint_wal(seq);

        info!(verb = %id, "verb added");
        Ok(id)
    }

    /// Returns `id`'s verb, or `None` if it doesn't exist or is
    /// soft-deleted (same contract as [`Self::get_noun`]).
    pub fn get_verb(&self, id: VerbId) -> Result<Option<Verb>> {
        self.check_direct_read_allowed("get_verb")?;
        let _guard = self.guard.read().unwrap();
        Ok(self.storage.get_verb(id)?.filter(|verb| !verb.is_deleted()))
    }

    /// Soft-deletes a verb. Its graph adjacency entry survives until the
    /// cleanup coordinator hard-deletes it, matching how a soft-deleted
    /// noun's incident verbs are only cascade-removed at that point
    /// (§4.8).
    #[instrument(skip(self))]
    pub fn delete_verb(&self, id: VerbId) -> Result<()> {
        self.check_mutation_allowed("delete_verb")?;
        let _guard = self.guard.write().unwrap();
        let mut verb = self.storage.get_verb(id)?.ok_or_else(|| NotFoundError::verb(id))?;
        if verb.is_deleted() {
            return Ok(());
        }
        let now = Timestamp::now();
        verb.metadata.mark_deleted(now);

        let seq = self.wal.append(WalOp::DeleteVerb, EntityId::Verb(id), hash_metadata(&verb.metadata))?;
        self.storage.save_verb(&verb)?;

        if let Err(e) =
            self.storage.hash_index_insert(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Verb(id))
        {
            warn!(verb = %id, error = %e, "failed to mark verb in deleted-set index");
        }
        if let Some(key) = self.bridge.lookup(EntityId::Verb(id)) {
            if let Err(e) = self.vectors.delete(key) {
                warn!(verb = %id, error = %e, "failed to tombstone deleted verb's vector");
            }
        }
        self.record_change(EntityId::Verb(id), ChangeKind::SoftDeleted, now);
        self.maybe_checkpoint_wal(seq);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn restore_verb(&self, id: VerbId) -> Result<()> {
        self.check_mutation_allowed("restore_verb")?;
        let _guard = self.guard.write().unwrap();
        let mut verb = self.storage.get_verb(id)?.ok_or_else(|| NotFoundError::verb(id))?;
        if !verb.is_deleted() {
            return Ok(());
        }
        let now = Timestamp::now();
        verb.metadata.mark_restored(now);

        let seq = self.wal.append(WalOp::UpdateVerb, EntityId::Verb(id), hash_metadata(&verb.metadata))?;
        self.storage.save_verb(&verb)?;

        if let Err(e) =
            self.storage.hash_index_remove(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Verb(id))
        {
            warn!(verb = %id, error = %e, "failed to clear verb's deleted-set index entry");
        }
        self.reindex_vector(EntityId::Verb(id), &verb.embedding);
        self.record_change(EntityId::Verb(id), ChangeKind::Updated, now);
        self.maybe_checkpoint_wal(seq);
        Ok(())
    }

    // =====================================================================
    // Query surface (§4.4, §6)
    // =====================================================================

    /// Similarity search shorthand: wraps `target` in a bare [`Query`] and
    /// runs it through [`Self::find`].
    pub fn search(&self, target: QueryTarget, options: QueryOptions) -> Result<QueryPage> {
        self.find(Query { like: Some(target), ..Default::default() }, options)
    }

    /// Runs a structured [`Query`]: similarity, metadata filter, and/or
    /// one-hop graph adjacency, fused into a single ranked page. A
    /// [`QueryTarget::Text`] target is embedded before reaching the query
    /// engine, which only accepts pre-computed vectors.
    #[instrument(skip(self, query, options))]
    pub fn find(&self, mut query: Query, options: QueryOptions) -> Result<QueryPage> {
        self.check_search_allowed("find")?;
        if let Some(QueryTarget::Text(text)) = &query.like {
            let vector = self.embedding.embed(text)?;
            query.like = Some(QueryTarget::Vector(vector));
        }
        let _guard = self.guard.read().unwrap();
        let ctx = self.query_context();
        let mut page = query::execute(&ctx, &query, &options, &self.config.query, Timestamp::now())?;
        for hook in &self.hooks {
            hook.on_after_search(&mut page);
        }
        Ok(page)
    }

    /// Finds nouns similar to an existing noun's own embedding.
    pub fn find_similar(&self, id: NounId, options: QueryOptions) -> Result<QueryPage> {
        self.check_search_allowed("find_similar")?;
        let _guard = self.guard.read().unwrap();
        let noun = self.storage.get_noun(id)?.ok_or_else(|| NotFoundError::noun(id))?;
        let query = Query { like: Some(QueryTarget::Vector(noun.embedding)), ..Default::default() };
        let ctx = self.query_context();
        query::execute(&ctx, &query, &options, &self.config.query, Timestamp::now())
    }

    /// Returns every distinct metadata field name present on a
    /// non-deleted noun, for building filter UIs.
    pub fn get_filter_fields(&self) -> Result<Vec<String>> {
        self.check_search_allowed("get_filter_fields")?;
        let _guard = self.guard.read().unwrap();
        let mut fields = std::collections::HashSet::new();
        for id in self.storage.list_noun_ids()? {
            let Some(noun) = self.storage.get_noun(id)? else { continue };
            if noun.is_deleted() {
                continue;
            }
            for (field, _) in noun.metadata.properties() {
                fields.insert(field.clone());
            }
        }
        let mut out: Vec<String> = fields.into_iter().collect();
        out.sort();
        Ok(out)
    }

    /// Returns every distinct value observed for `field` across
    /// non-deleted nouns.
    pub fn get_filter_values(&self, field: &str) -> Result<Vec<Value>> {
        self.check_search_allowed("get_filter_values")?;
        let _guard = self.guard.read().unwrap();
        let mut seen = std::collections::HashSet::new();
        let mut values = Vec::new();
        for id in self.storage.list_noun_ids()? {
            let Some(noun) = self.storage.get_noun(id)? else { continue };
            if noun.is_deleted() {
                continue;
            }
            if let Some(value) = noun.metadata.get(field) {
                if seen.insert(serde_json::to_string(value).unwrap_or_default()) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    pub fn get_statistics(&self, options: StatisticsOptions) -> Result<Statistics> {
        let _guard = self.guard.read().unwrap();
        Ok(Statistics {
            noun_count: self.storage.list_noun_ids()?.len(),
            verb_count: self.storage.list_verb_ids()?.len(),
            active_vector_count: self.vectors.len(),
            graph_edge_count: self.graph.len(),
            cache_entries: options.include_cache.then(|| self.cache.len()),
            cache_bytes: options.include_cache.then(|| self.cache.current_size_bytes()),
        })
    }

    // =====================================================================
    // Background maintenance (§4.8)
    // =====================================================================

    /// Runs one cleanup pass synchronously. Rejected while frozen; a
    /// no-op if [`crate::config::CleanupConfig::enabled`] is `false`.
    pub fn run_cleanup(&self) -> Result<CleanupReport> {
        if self.mode.read().unwrap().frozen {
            return Err(BrainyError::frozen("run_cleanup"));
        }
        if !self.config.cleanup.enabled {
            return Ok(CleanupReport::default());
        }
        let _guard = self.guard.write().unwrap();
        let ctx = CleanupContext {
            storage: self.storage.as_ref(),
            vectors: &self.vectors,
            graph: &self.graph,
            bridge: &self.bridge,
        };
        cleanup::run_once(&ctx, &self.config.cleanup, Timestamp::now())
    }

    /// Spawns a background task that runs [`Self::run_cleanup`] and the
    /// cache's fairness monitor on their configured intervals. Requires
    /// the `sync` feature and an `Arc`-wrapped `self` so the task can
    /// outlive the caller's stack frame.
    #[cfg(feature = "sync")]
    pub fn spawn_background_tasks(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(self.config.cleanup.interval_secs.max(1)));
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cleanup() {
                    warn!(error = %e, "background cleanup tick failed");
                }
                self.cache.run_fairness_check();
            }
        })
    }
}

fn wal_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("wal")
}

/// Hashes an embedding for `WalRecord::payload_hash`; `f32` isn't `Hash`,
/// so compare by bit pattern instead.
fn hash_vector(embedding: &[f32]) -> u64 {
    let bits: Vec<u32> = embedding.iter().map(|f| f.to_bits()).collect();
    hash_payload(&bits)
}

fn hash_metadata(metadata: &Metadata) -> u64 {
    hash_payload(&serde_json::to_vec(metadata).unwrap_or_default())
}

#[cfg(test)]
fn assert_send_sync<T: Send + Sync>() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingDimension;
    use crate::noun::NounType;
    use crate::verb::VerbType;
    use tempfile::tempdir;

    fn test_config() -> Config {
        Config { embedding_dimension: EmbeddingDimension::Custom(2), ..Config::ephemeral() }
    }

    #[test]
    fn test_brainydb_is_send_sync() {
        assert_send_sync::<BrainyDb>();
    }

    #[test]
    fn test_open_creates_database() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        assert_eq!(db.embedding_dimension(), 2);
    }

    #[test]
    fn test_config_validation_rejected_at_open() {
        let dir = tempdir().unwrap();
        let config = Config { embedding_dimension: EmbeddingDimension::Custom(0), ..Config::ephemeral() };
        assert!(BrainyDb::open(dir.path().join("test.db"), config).is_err());
    }

    #[test]
    fn test_add_and_get_noun_roundtrip() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let id = db
            .add_noun(NewNoun { noun_type: NounType::Concept, vector: Some(vec![0.1, 0.2]), ..Default::default() })
            .unwrap();
        let noun = db.get_noun(id).unwrap().unwrap();
        assert_eq!(noun.noun_type, NounType::Concept);
        assert!(!noun.is_deleted());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let result = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2, 0.3]), ..Default::default() });
        assert!(result.is_err());
    }

    #[test]
    fn test_soft_delete_and_restore_roundtrip() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let id = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();

        db.delete_noun(id).unwrap();
        assert!(db.get_noun(id).unwrap().is_none());

        db.restore_noun(id).unwrap();
        assert!(!db.get_noun(id).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn test_get_noun_hides_soft_deleted_entity() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let id = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();

        assert!(db.get_noun(id).unwrap().is_some());
        db.delete_noun(id).unwrap();
        assert!(db.get_noun(id).unwrap().is_none());
    }

    #[test]
    fn test_get_verb_hides_soft_deleted_entity() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let a = db.add_noun(NewNoun { vector: Some(vec![0.0, 0.0]), ..Default::default() }).unwrap();
        let b = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.1]), ..Default::default() }).unwrap();
        let verb_id = db
            .add_verb(NewVerb {
                source_id: a,
                target_id: b,
                verb_type: VerbType::RelatedTo,
                weight: None,
                confidence: None,
                vector: Some(vec![0.0, 0.1]),
                properties: Map::new(),
            })
            .unwrap();

        assert!(db.get_verb(verb_id).unwrap().is_some());
        db.delete_verb(verb_id).unwrap();
        assert!(db.get_verb(verb_id).unwrap().is_none());
    }

    #[test]
    fn test_add_verb_requires_existing_nouns() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let a = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();
        let missing = NounId::new();

        let result = db.add_verb(NewVerb {
            source_id: a,
            target_id: missing,
            verb_type: VerbType::RelatedTo,
            weight: None,
            confidence: None,
            vector: Some(vec![0.1, 0.1]),
            properties: Map::new(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_add_verb_and_find_via_connected_query() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let a = db.add_noun(NewNoun { vector: Some(vec![0.0, 0.0]), ..Default::default() }).unwrap();
        let b = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.1]), ..Default::default() }).unwrap();
        db.add_verb(NewVerb {
            source_id: a,
            target_id: b,
            verb_type: VerbType::RelatedTo,
            weight: None,
            confidence: None,
            vector: Some(vec![0.0, 0.1]),
            properties: Map::new(),
        })
        .unwrap();

        let query = Query {
            connected: Some(crate::query::ConnectedSpec {
                from: a,
                via: None,
                direction: crate::verb::VerbDirection::Outgoing,
            }),
            ..Default::default()
        };
        let page = db.find(query, QueryOptions::from_config(&db.config.query)).unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].noun.id, b);
    }

    #[test]
    fn test_hook_tags_noun_before_persistence() {
        use crate::hooks::BrainyHook;

        struct TagHook;
        impl BrainyHook for TagHook {
            fn on_before_add_noun(&self, noun: &mut NewNoun) {
                noun.properties.insert("tagged".to_string(), serde_json::json!(true));
            }
        }

        let dir = tempdir().unwrap();
        let db =
            BrainyDb::open_with_hooks(dir.path().join("test.db"), test_config(), vec![Arc::new(TagHook)]).unwrap();
        let id = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();
        let noun = db.get_noun(id).unwrap().unwrap();
        assert_eq!(noun.metadata.get("tagged"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_read_only_mode_rejects_mutations() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        db.set_read_only(true);
        let result = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() });
        assert!(result.is_err());
        assert!(result.unwrap_err().is_mode_violation());
    }

    #[test]
    fn test_write_only_mode_rejects_search_but_allows_direct_reads() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let id = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();

        db.set_write_only(true, true);
        assert!(db.get_noun(id).unwrap().is_some());
        assert!(db.find(Query::default(), QueryOptions::from_config(&db.config.query)).is_err());
    }

    #[test]
    fn test_frozen_mode_rejects_mutation_and_cleanup() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        db.set_frozen(true);
        assert!(db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).is_err());
        assert!(db.run_cleanup().is_err());
    }

    #[test]
    fn test_get_filter_fields_and_values() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let mut props = Map::new();
        props.insert("role".to_string(), serde_json::json!("admin"));
        db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), properties: props, ..Default::default() }).unwrap();

        assert_eq!(db.get_filter_fields().unwrap(), vec!["role".to_string()]);
        assert_eq!(db.get_filter_values("role").unwrap(), vec![serde_json::json!("admin")]);
    }

    #[test]
    fn test_nested_metadata_is_indexed_and_filterable_by_dot_path() {
        use crate::metadata::FilterNode;

        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        let mut props = Map::new();
        props.insert("address".to_string(), serde_json::json!({"city": "NYC", "zip": 10001}));
        let nyc = db
            .add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), properties: props, ..Default::default() })
            .unwrap();

        let mut other_props = Map::new();
        other_props.insert("address".to_string(), serde_json::json!({"city": "Boston", "zip": 2101}));
        db.add_noun(NewNoun { vector: Some(vec![0.3, 0.4]), properties: other_props, ..Default::default() })
            .unwrap();

        let noun = db.get_noun(nyc).unwrap().unwrap();
        assert_eq!(noun.metadata.get("address.city"), Some(&serde_json::json!("NYC")));

        let query = Query {
            r#where: Some(FilterNode::Equals { field: "address.city".into(), value: serde_json::json!("NYC") }),
            ..Default::default()
        };
        let page = db.find(query, QueryOptions::from_config(&db.config().query)).unwrap();
        let ids: Vec<_> = page.hits.iter().map(|h| h.noun.id).collect();
        assert_eq!(ids, vec![nyc]);
    }

    #[test]
    fn test_get_statistics_counts_entities() {
        let dir = tempdir().unwrap();
        let db = BrainyDb::open(dir.path().join("test.db"), test_config()).unwrap();
        db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();
        let stats = db.get_statistics(StatisticsOptions::default()).unwrap();
        assert_eq!(stats.noun_count, 1);
        assert_eq!(stats.verb_count, 0);
    }

    #[test]
    fn test_reopen_rebuilds_index_from_storage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let id = {
            let db = BrainyDb::open(&path, test_config()).unwrap();
            let id = db.add_noun(NewNoun { vector: Some(vec![0.1, 0.2]), ..Default::default() }).unwrap();
            db.shut_down().unwrap();
            id
        };
        let db = BrainyDb::open(&path, test_config()).unwrap();
        assert!(db.get_noun(id).unwrap().is_some());
        let page = db
            .find(
                Query { like: Some(QueryTarget::Vector(vec![0.1, 0.2])), ..Default::default() },
                QueryOptions::from_config(&db.config.query),
            )
            .unwrap();
        assert_eq!(page.hits.len(), 1);
    }
}
