//! The cleanup coordinator (§4.8): periodically converts soft-deleted
//! nouns/verbs into physical removal once they've aged past
//! [`crate::config::CleanupConfig::max_age_secs`].
//!
//! Each item is processed storage-first: delete from storage, then excise
//! from the HNSW index (re-stitching its neighbors), then the metadata
//! index, then graph adjacency. A crash between steps leaves an orphan the
//! next open's storage reconciliation prunes; a failure partway through a
//! single item is logged and skipped rather than rolled back (§4.8, "no
//! partial roll-forward").

use serde_json::Value;
use tracing::{debug, warn};

use crate::bridge::IdBridge;
use crate::config::CleanupConfig;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::metadata::index::{
    encode_hashable_value, encode_sortable_value, flatten_leaves, index_target, IndexTarget, DOT_PATH_DEPTH_LIMIT,
};
use crate::storage::StorageEngine;
use crate::types::{EntityId, NounId, Timestamp, VerbId};
use crate::vector::VectorIndex;
use crate::verb::VerbDirection;

/// Reserved hash-index field under which every soft-deleted entity is
/// tracked, independent of its caller-visible properties (§4.7: "the
/// metadata index maintains the set `{id : _brainy.deleted=true}`
/// explicitly").
pub const DELETED_INDEX_FIELD: &str = "_brainy.deleted";

/// The index-key bytes for `_brainy.deleted == true`, shared by whatever
/// maintains the set (the facade, on delete/restore) and whatever reads it
/// (this module).
pub fn deleted_marker_bytes() -> Vec<u8> {
    encode_hashable_value(&Value::Bool(true))
}

/// Outcome of a single cleanup pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanupReport {
    pub items_processed: usize,
    pub items_deleted: usize,
    pub errors: usize,
    pub last_run: Timestamp,
    pub next_run: Timestamp,
}

/// Everything a cleanup pass needs a handle on. Borrowed rather than owned
/// so the facade can run a pass without handing over its components.
pub struct CleanupContext<'a> {
    pub storage: &'a dyn StorageEngine,
    pub vectors: &'a dyn VectorIndex,
    pub graph: &'a GraphStore,
    pub bridge: &'a IdBridge,
}

/// Runs one cleanup pass. Caller is responsible for checking read-only /
/// frozen mode before invoking this (§5: cleanup is disabled in both).
pub fn run_once(ctx: &CleanupContext<'_>, config: &CleanupConfig, now: Timestamp) -> Result<CleanupReport> {
    let mut report = CleanupReport {
        last_run: now,
        next_run: Timestamp::from_millis(now.as_millis() + config.interval_secs as i64 * 1000),
        ..Default::default()
    };

    let cutoff = now.saturating_sub_millis(config.max_age_secs * 1000);
    let candidates = ctx.storage.hash_index_lookup(DELETED_INDEX_FIELD, &deleted_marker_bytes())?;

    for entity in candidates.into_iter().take(config.batch_size) {
        report.items_processed += 1;
        match process_one(ctx, entity, cutoff) {
            Ok(true) => report.items_deleted += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(entity = %entity, error = %e, "cleanup: failed to hard-delete item, skipping");
                report.errors += 1;
            }
        }
    }

    debug!(
        processed = report.items_processed,
        deleted = report.items_deleted,
        errors = report.errors,
        "cleanup pass complete"
    );
    Ok(report)
}

/// Returns `Ok(true)` if the entity was old enough and was removed,
/// `Ok(false)` if it wasn't yet eligible.
fn process_one(ctx: &CleanupContext<'_>, entity: EntityId, cutoff: Timestamp) -> Result<bool> {
    match entity {
        EntityId::Noun(id) => process_noun(ctx, id, cutoff),
        EntityId::Verb(id) => process_verb(ctx, id, cutoff),
    }
}

fn process_noun(ctx: &CleanupContext<'_>, id: NounId, cutoff: Timestamp) -> Result<bool> {
    let Some(noun) = ctx.storage.get_noun(id)? else {
        return Ok(false);
    };
    let lifecycle = noun.metadata.lifecycle();
    if !lifecycle.deleted || lifecycle.updated > cutoff {
        return Ok(false);
    }

    // Cascade: incident verbs must go first so no edge outlives an endpoint.
    for verb_id in ctx.graph.verbs_for_noun(id, VerbDirection::Both) {
        if let Err(e) = hard_delete_verb(ctx, verb_id) {
            warn!(verb = %verb_id, error = %e, "cleanup: failed to cascade-delete incident verb");
        }
    }

    ctx.storage.delete_noun(id)?;

    let entity = EntityId::Noun(id);
    if let Some(key) = ctx.bridge.lookup(entity) {
        if let Err(e) = ctx.vectors.hard_delete(key) {
            warn!(noun = %id, error = %e, "cleanup: failed to excise noun from HNSW index");
        }
        ctx.bridge.remove(entity);
    }
    unindex_metadata(ctx, entity, &noun.metadata);

    Ok(true)
}

fn process_verb(ctx: &CleanupContext<'_>, id: VerbId, cutoff: Timestamp) -> Result<bool> {
    let Some(verb) = ctx.storage.get_verb(id)? else {
        return Ok(false);
    };
    let lifecycle = verb.metadata.lifecycle();
    if !lifecycle.deleted || lifecycle.updated > cutoff {
        return Ok(false);
    }
    hard_delete_verb(ctx, id)?;
    Ok(true)
}

/// Physically removes a verb and its derived state, used both for direct
/// cleanup and cascade-delete from a removed noun.
fn hard_delete_verb(ctx: &CleanupContext<'_>, id: VerbId) -> Result<()> {
    let Some(verb) = ctx.storage.get_verb(id)? else {
        return Ok(());
    };
    ctx.storage.delete_verb(id)?;
    ctx.graph.remove(id, verb.source_id, verb.target_id, verb.verb_type);

    let entity = EntityId::Verb(id);
    if let Some(key) = ctx.bridge.lookup(entity) {
        if let Err(e) = ctx.vectors.hard_delete(key) {
            warn!(verb = %id, error = %e, "cleanup: failed to excise verb from HNSW index");
        }
        ctx.bridge.remove(entity);
    }
    unindex_metadata(ctx, entity, &verb.metadata);
    Ok(())
}

fn unindex_metadata(ctx: &CleanupContext<'_>, entity: EntityId, metadata: &crate::metadata::Metadata) {
    if let Err(e) = ctx.storage.hash_index_remove(DELETED_INDEX_FIELD, &deleted_marker_bytes(), entity) {
        warn!(entity = %entity, error = %e, "cleanup: failed to clear deleted-set index entry");
    }
    let mut leaves = Vec::new();
    for (field, value) in metadata.properties() {
        flatten_leaves(field, value, DOT_PATH_DEPTH_LIMIT, &mut leaves);
    }
    for (field, value) in &leaves {
        match index_target(value) {
            IndexTarget::HashAndSorted => {
                let _ = ctx.storage.hash_index_remove(field, &encode_hashable_value(value), entity);
                if let Some(bytes) = encode_sortable_value(value) {
                    let _ = ctx.storage.sorted_index_remove(field, &bytes, entity);
                }
            }
            IndexTarget::HashOnly => {
                let _ = ctx.storage.hash_index_remove(field, &encode_hashable_value(value), entity);
            }
            IndexTarget::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::Metadata;
    use crate::noun::{Noun, NounType};
    use crate::storage::open_storage;
    use crate::verb::{Verb, VerbType};
    use serde_json::Map;
    use tempfile::tempdir;

    fn aged_noun(now: Timestamp, age_secs: i64) -> Noun {
        let created = now.saturating_sub_millis(age_secs * 1000);
        let mut metadata = Metadata::new(Map::new(), created);
        metadata.mark_deleted(created);
        Noun {
            id: NounId::new(),
            noun_type: NounType::Thing,
            embedding: vec![0.1, 0.2],
            metadata,
        }
    }

    #[test]
    fn test_run_once_hard_deletes_aged_soft_deleted_noun() {
        let dir = tempdir().unwrap();
        let storage = open_storage(dir.path().join("test.db"), &Config::ephemeral()).unwrap();
        let noun = aged_noun(Timestamp::from_millis(10_000_000), 7200);
        storage.save_noun(&noun).unwrap();
        storage
            .hash_index_insert(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Noun(noun.id))
            .unwrap();

        let vectors = crate::vector::HnswIndex::new(2, &crate::config::HnswConfig::default());
        let graph = GraphStore::new();
        let bridge = IdBridge::new();
        let ctx = CleanupContext {
            storage: storage.as_ref(),
            vectors: &vectors,
            graph: &graph,
            bridge: &bridge,
        };
        let config = CleanupConfig { max_age_secs: 3600, ..Default::default() };

        let report = run_once(&ctx, &config, Timestamp::from_millis(10_000_000)).unwrap();
        assert_eq!(report.items_processed, 1);
        assert_eq!(report.items_deleted, 1);
        assert!(storage.get_noun(noun.id).unwrap().is_none());
    }

    #[test]
    fn test_run_once_skips_not_yet_aged_item() {
        let dir = tempdir().unwrap();
        let storage = open_storage(dir.path().join("test.db"), &Config::ephemeral()).unwrap();
        let noun = aged_noun(Timestamp::from_millis(10_000_000), 10);
        storage.save_noun(&noun).unwrap();
        storage
            .hash_index_insert(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Noun(noun.id))
            .unwrap();

        let vectors = crate::vector::HnswIndex::new(2, &crate::config::HnswConfig::default());
        let graph = GraphStore::new();
        let bridge = IdBridge::new();
        let ctx = CleanupContext {
            storage: storage.as_ref(),
            vectors: &vectors,
            graph: &graph,
            bridge: &bridge,
        };
        let config = CleanupConfig { max_age_secs: 3600, ..Default::default() };

        let report = run_once(&ctx, &config, Timestamp::from_millis(10_000_000)).unwrap();
        assert_eq!(report.items_processed, 1);
        assert_eq!(report.items_deleted, 0);
        assert!(storage.get_noun(noun.id).unwrap().is_some());
    }

    #[test]
    fn test_cascade_deletes_incident_verbs_with_noun() {
        let dir = tempdir().unwrap();
        let storage = open_storage(dir.path().join("test.db"), &Config::ephemeral()).unwrap();
        let noun = aged_noun(Timestamp::from_millis(10_000_000), 7200);
        let other = NounId::new();
        storage.save_noun(&noun).unwrap();

        let verb = Verb {
            id: VerbId::new(),
            source_id: noun.id,
            target_id: other,
            verb_type: VerbType::RelatedTo,
            weight: 0.5,
            confidence: None,
            embedding: vec![0.1, 0.2],
            metadata: Metadata::new(Map::new(), Timestamp::from_millis(0)),
        };
        storage.save_verb(&verb).unwrap();
        storage
            .hash_index_insert(DELETED_INDEX_FIELD, &deleted_marker_bytes(), EntityId::Noun(noun.id))
            .unwrap();

        let vectors = crate::vector::HnswIndex::new(2, &crate::config::HnswConfig::default());
        let graph = GraphStore::new();
        graph.insert(verb.id, noun.id, other, VerbType::RelatedTo);
        let bridge = IdBridge::new();
        let ctx = CleanupContext {
            storage: storage.as_ref(),
            vectors: &vectors,
            graph: &graph,
            bridge: &bridge,
        };
        let config = CleanupConfig { max_age_secs: 3600, ..Default::default() };

        run_once(&ctx, &config, Timestamp::from_millis(10_000_000)).unwrap();
        assert!(storage.get_verb(verb.id).unwrap().is_none());
        assert!(graph.verbs_for_noun(noun.id, VerbDirection::Both).is_empty());
    }
}
