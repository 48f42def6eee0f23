//! The query engine (§4.4): fuses vector similarity, metadata filtering,
//! and one-hop graph adjacency into a single ranked, paginated result set.
//!
//! This module is pure with respect to its inputs — it borrows the
//! storage/vector/graph/bridge components via [`QueryContext`] rather than
//! owning them, the same shape [`crate::cleanup`] uses, so the facade can
//! run a query without giving up ownership of its components.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::bridge::IdBridge;
use crate::config::QueryConfig;
use crate::error::{BrainyError, Result};
use crate::graph::GraphStore;
use crate::metadata::filter::{CompiledFilter, FilterNode};
use crate::metadata::index::encode_hashable_value;
use crate::noun::Noun;
use crate::storage::StorageEngine;
use crate::types::{EntityId, NounId, Timestamp};
use crate::vector::VectorIndex;
use crate::verb::{VerbDirection, VerbType};

/// Either a pre-computed vector or text the facade's embedding service
/// must turn into one before the query reaches this module.
#[derive(Clone, Debug)]
pub enum QueryTarget {
    Text(String),
    Vector(Vec<f32>),
}

/// One-hop adjacency constraint: only nouns reachable from `from` via
/// `via` (any type if `None`) in `direction` survive.
#[derive(Clone, Copy, Debug)]
pub struct ConnectedSpec {
    pub from: NounId,
    pub via: Option<VerbType>,
    pub direction: VerbDirection,
}

/// A hybrid query: similarity target, metadata predicate, and/or graph
/// adjacency. A query with every field `None` degenerates to "every
/// non-deleted noun, in id order".
#[derive(Clone, Debug, Default)]
pub struct Query {
    pub like: Option<QueryTarget>,
    pub r#where: Option<FilterNode>,
    pub connected: Option<ConnectedSpec>,
}

/// Tuning and pagination knobs for a single [`Query`] execution.
#[derive(Clone, Debug)]
pub struct QueryOptions {
    pub limit: usize,
    pub offset: usize,
    pub cursor: Option<String>,
    pub threshold: Option<f32>,
    pub vector_weight: Option<f32>,
    pub metadata_weight: Option<f32>,
    pub exclude_deleted: bool,
}

impl QueryOptions {
    /// Defaults drawn from [`QueryConfig`]: page size, no cursor, no
    /// threshold, fusion weights inherited, deleted items excluded.
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            limit: config.default_limit,
            offset: 0,
            cursor: None,
            threshold: None,
            vector_weight: None,
            metadata_weight: None,
            exclude_deleted: true,
        }
    }
}

/// A single ranked query result.
#[derive(Clone, Debug)]
pub struct QueryHit {
    pub noun: Noun,
    pub score: f32,
    /// HNSW distance to the query vector, if this was a `like` query.
    pub distance: Option<f32>,
}

/// A page of results plus the cursor to fetch the next one.
#[derive(Clone, Debug)]
pub struct QueryPage {
    pub hits: Vec<QueryHit>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Opaque pagination token: offset into the fused, sorted result order,
/// the query's signature (so a cursor can't be replayed against a
/// different query), and the moment it was issued (so a data change can
/// invalidate it, §4.4 / resolved Open Question 3).
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Cursor {
    signature: u64,
    offset: usize,
    issued_at: i64,
}

impl Cursor {
    fn encode(&self) -> String {
        let bytes = bincode::serialize(self).unwrap_or_default();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn decode(token: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(token).ok()?;
        bincode::deserialize(&bytes).ok()
    }
}

/// Everything a query execution needs a handle on.
pub struct QueryContext<'a> {
    pub storage: &'a dyn StorageEngine,
    pub vectors: &'a dyn VectorIndex,
    pub graph: &'a GraphStore,
    pub bridge: &'a IdBridge,
}

/// Executes `query` and returns one page of results.
///
/// `now` is the instant against which cursor staleness is checked;
/// callers pass [`Timestamp::now`] in production and a fixed value in
/// tests.
#[instrument(skip(ctx, query, options, config))]
pub fn execute(
    ctx: &QueryContext<'_>,
    query: &Query,
    options: &QueryOptions,
    config: &QueryConfig,
    now: Timestamp,
) -> Result<QueryPage> {
    let limit = options.limit.clamp(1, config.max_limit);
    let signature = query_signature(query, options);

    let start_offset = match &options.cursor {
        Some(token) => match Cursor::decode(token) {
            Some(cursor) if cursor.signature == signature && !cursor_is_stale(ctx, cursor.issued_at)? => {
                cursor.offset
            }
            _ => {
                debug!("query cursor stale or signature mismatch, returning empty page");
                return Ok(QueryPage { hits: Vec::new(), next_cursor: None, has_more: false });
            }
        },
        None => options.offset,
    };

    let compiled = query.r#where.as_ref().map(FilterNode::compile).transpose()?;
    let mut candidates = candidate_set(ctx, query.r#where.as_ref(), compiled.as_ref(), config, options.exclude_deleted)?;
    if let Some(spec) = &query.connected {
        candidates = intersect_connected(ctx, candidates, spec);
    }

    let vector_weight = options.vector_weight.unwrap_or(config.vector_weight);
    let metadata_weight = options.metadata_weight.unwrap_or(config.metadata_weight);

    let mut scored: Vec<(NounId, f32, Option<f32>)> = match &query.like {
        Some(QueryTarget::Vector(vector)) => {
            let k = (start_offset + limit).max(1);
            let ef_search = k.max(64);
            let results = ctx.vectors.search_filtered(vector, k, ef_search, &|key| {
                ctx.bridge
                    .resolve(key)
                    .map(|entity| matches!(entity, EntityId::Noun(id) if candidates.contains(&id)))
                    .unwrap_or(false)
            })?;
            results
                .into_iter()
                .filter_map(|(key, distance)| match ctx.bridge.resolve(key) {
                    Some(EntityId::Noun(id)) => Some((id, distance)),
                    _ => None,
                })
                .map(|(id, distance)| {
                    let boost = metadata_boost(compiled.as_ref(), ctx, id);
                    let score = vector_weight * (1.0 - distance) + metadata_weight * boost;
                    (id, score, Some(distance))
                })
                .collect()
        }
        Some(QueryTarget::Text(_)) => {
            return Err(BrainyError::embedding(
                "text query targets must be embedded before reaching the query engine",
            ));
        }
        None => {
            let mut ids: Vec<NounId> = candidates.into_iter().collect();
            ids.sort_by_key(|id| id.0);
            ids.into_iter()
                .map(|id| {
                    let boost = metadata_boost(compiled.as_ref(), ctx, id);
                    (id, metadata_weight * boost, None)
                })
                .collect()
        }
    };

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.0.cmp(&b.0.0)));

    if let Some(threshold) = options.threshold {
        scored.retain(|(_, score, _)| *score >= threshold);
    }

    let total = scored.len();
    let page_end = (start_offset + limit).min(total);
    let page = if start_offset < total { &scored[start_offset..page_end] } else { &[] };

    let mut hits = Vec::with_capacity(page.len());
    for (id, score, distance) in page {
        if let Some(noun) = ctx.storage.get_noun(*id)? {
            if options.exclude_deleted && noun.is_deleted() {
                continue;
            }
            hits.push(QueryHit { noun, score: *score, distance: *distance });
        }
    }

    let has_more = page_end < total;
    let next_cursor = has_more
        .then(|| Cursor { signature, offset: page_end, issued_at: now.as_millis() }.encode());

    Ok(QueryPage { hits, next_cursor, has_more })
}

/// Computes the candidate noun-id set for `compiled`, narrowing via the
/// hash index first when the filter reduces to a conjunction of
/// equalities and the narrowed set stays within
/// [`QueryConfig::selective_threshold`]; otherwise falls back to a full
/// scan of every noun (§4.4 step 1).
///
/// Every candidate, narrowed or not, is re-checked against the full
/// compiled filter and the deleted flag before being returned — the index
/// probe is purely an optimization, never a substitute for correctness.
fn candidate_set(
    ctx: &QueryContext<'_>,
    raw_filter: Option<&FilterNode>,
    compiled: Option<&CompiledFilter>,
    config: &QueryConfig,
    exclude_deleted: bool,
) -> Result<HashSet<NounId>> {
    let narrowed = match raw_filter.and_then(extract_equalities) {
        Some(equalities) if !equalities.is_empty() => {
            let mut sets = Vec::with_capacity(equalities.len());
            for (field, value) in &equalities {
                let bytes = encode_hashable_value(value);
                let ids: HashSet<NounId> = ctx
                    .storage
                    .hash_index_lookup(field, &bytes)?
                    .into_iter()
                    .filter_map(|e| match e {
                        EntityId::Noun(id) => Some(id),
                        EntityId::Verb(_) => None,
                    })
                    .collect();
                sets.push(ids);
            }
            let mut iter = sets.into_iter();
            let mut result = iter.next().unwrap_or_default();
            for s in iter {
                result = &result & &s;
            }
            (result.len() <= config.selective_threshold).then_some(result)
        }
        _ => None,
    };

    let universe: Vec<NounId> = match narrowed {
        Some(set) => set.into_iter().collect(),
        None => ctx.storage.list_noun_ids()?,
    };

    let mut out = HashSet::with_capacity(universe.len());
    for id in universe {
        let Some(noun) = ctx.storage.get_noun(id)? else { continue };
        if exclude_deleted && noun.is_deleted() {
            continue;
        }
        if let Some(filter) = compiled {
            if !filter.matches(&noun.metadata) {
                continue;
            }
        }
        out.insert(id);
    }
    Ok(out)
}

/// Recognizes a filter that reduces to a conjunction of top-level
/// equalities, the only shape this module knows how to push down to the
/// hash index. Anything else (ranges, `anyOf`, regex, ...) returns `None`
/// and falls back to a full scan.
fn extract_equalities(node: &FilterNode) -> Option<Vec<(String, Value)>> {
    match node {
        FilterNode::Equals { field, value } => Some(vec![(field.clone(), value.clone())]),
        FilterNode::AllOf(nodes) => {
            let mut out = Vec::new();
            for n in nodes {
                out.extend(extract_equalities(n)?);
            }
            Some(out)
        }
        _ => None,
    }
}

/// Intersects `candidates` with nouns reachable from `spec.from` by a
/// single hop of the specified type/direction (§4.4 step 2).
fn intersect_connected(ctx: &QueryContext<'_>, candidates: HashSet<NounId>, spec: &ConnectedSpec) -> HashSet<NounId> {
    let mut reachable = HashSet::new();
    for verb_id in ctx.graph.verbs_for_noun(spec.from, spec.direction) {
        let Ok(Some(verb)) = ctx.storage.get_verb(verb_id) else { continue };
        if let Some(via) = spec.via {
            if verb.verb_type != via {
                continue;
            }
        }
        let other = if verb.source_id == spec.from { verb.target_id } else { verb.source_id };
        reachable.insert(other);
    }
    candidates.into_iter().filter(|id| reachable.contains(id)).collect()
}

/// The metadata contribution to fusion scoring. Every surviving candidate
/// already satisfies `where` (see [`candidate_set`]), so this is
/// currently a simple presence signal rather than a graded score; it
/// exists as the hook `metadata_weight` scales (§4.4 step 4).
fn metadata_boost(compiled: Option<&CompiledFilter>, ctx: &QueryContext<'_>, id: NounId) -> f32 {
    match compiled {
        None => 1.0,
        Some(filter) => ctx
            .storage
            .get_noun(id)
            .ok()
            .flatten()
            .map(|noun| if filter.matches(&noun.metadata) { 1.0 } else { 0.0 })
            .unwrap_or(0.0),
    }
}

/// Hashes a query and its options into a signature used to validate
/// cursors against the query they were issued for. [`FilterNode`] has no
/// `Hash` impl (its leaves are `serde_json::Value`), so its `Debug`
/// rendering stands in — stable enough to detect "this cursor belongs to
/// a different query" without needing a canonical hash of the tree.
fn query_signature(query: &Query, options: &QueryOptions) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    match &query.like {
        Some(QueryTarget::Text(s)) => s.hash(&mut hasher),
        Some(QueryTarget::Vector(v)) => {
            for f in v {
                f.to_bits().hash(&mut hasher);
            }
        }
        None => 0u8.hash(&mut hasher),
    }
    format!("{:?}", query.r#where).hash(&mut hasher);
    if let Some(spec) = &query.connected {
        spec.from.hash(&mut hasher);
        format!("{:?}", spec.via).hash(&mut hasher);
        format!("{:?}", spec.direction).hash(&mut hasher);
    }
    options.limit.hash(&mut hasher);
    options.exclude_deleted.hash(&mut hasher);
    hasher.finish()
}

/// A cursor is stale once any mutation has landed since it was issued
/// (§4.4: "on mismatch the engine returns `has_more=false` rather than an
/// inconsistent page").
fn cursor_is_stale(ctx: &QueryContext<'_>, issued_at: i64) -> Result<bool> {
    let changes = ctx.storage.get_changes_since(Timestamp::from_millis(issued_at), 1)?;
    Ok(!changes.is_empty())
}
