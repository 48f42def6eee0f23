//! Hand-rolled hierarchical navigable small-world (HNSW) vector index.
//!
//! This is a from-scratch implementation of Malkov & Yashunin's HNSW
//! algorithm (§4.1) — no external approximate-nearest-neighbor crate is
//! used. Layer assignment uses a seeded PRNG so that, for a fixed
//! insertion order, the resulting graph shape is fully reproducible.
//!
//! # Structure
//!
//! - Layer 0 holds every inserted element and caps each node's edge list
//!   at `m_max0` neighbors.
//! - Layers ≥ 1 hold a randomly-thinned subset of elements (the
//!   probability of reaching layer `l` decays geometrically) and cap
//!   edge lists at `m` neighbors.
//! - Search greedily descends from the entry point through the upper
//!   layers (beam width 1) then runs a wider beam search at layer 0.
//!
//! # Neighbor diversity heuristic
//!
//! When connecting a new node, instead of always keeping the `m` closest
//! candidates, a candidate is discarded if it is farther from the new
//! point than it is from some node already selected as a neighbor. This
//! spreads the new node's edges across directions rather than clustering
//! them all on one side (this is the heuristic in the original paper,
//! Algorithm 4).
//!
//! # Thread safety
//!
//! The graph lives behind a single `RwLock`. Reads (search) take a
//! shared lock; writes (insert, delete) take an exclusive lock. This is
//! coarser-grained than production HNSW implementations but keeps the
//! bookkeeping (entry point updates, level assignment) trivially correct.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::HnswConfig;
use crate::error::{BrainyError, Result};

use super::distance::Metric;
use super::VectorIndex;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Scored {
    distance: f32,
    id: usize,
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // NaN should never occur (embeddings are validated on the way in);
        // fall back to Equal rather than panicking if it somehow does.
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
    }
}

struct Element {
    embedding: Vec<f32>,
    level: usize,
    deleted: bool,
}

/// A single layer's adjacency lists, keyed by element id.
type LayerEdges = std::collections::HashMap<usize, Vec<usize>>;

struct Graph {
    elements: Vec<Option<Element>>,
    layer0: LayerEdges,
    layers: Vec<LayerEdges>,
    entry_point: Option<usize>,
    active_count: usize,
}

impl Graph {
    fn new() -> Self {
        Self {
            elements: Vec::new(),
            layer0: LayerEdges::new(),
            layers: Vec::new(),
            entry_point: None,
            active_count: 0,
        }
    }

    fn top_level(&self) -> usize {
        self.layers.len()
    }

    fn neighbors(&self, layer: usize, id: usize) -> &[usize] {
        if layer == 0 {
            self.layer0.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
        } else {
            self.layers
                .get(layer - 1)
                .and_then(|l| l.get(&id))
                .map(|v| v.as_slice())
                .unwrap_or(&[])
        }
    }

    fn set_neighbors(&mut self, layer: usize, id: usize, neighbors: Vec<usize>) {
        if layer == 0 {
            self.layer0.insert(id, neighbors);
        } else {
            self.layers[layer - 1].insert(id, neighbors);
        }
    }

    fn embedding(&self, id: usize) -> &[f32] {
        &self.elements[id].as_ref().expect("live element").embedding
    }

    fn is_deleted(&self, id: usize) -> bool {
        self.elements
            .get(id)
            .and_then(|e| e.as_ref())
            .map(|e| e.deleted)
            .unwrap_or(true)
    }
}

/// Serializable sidecar metadata, persisted alongside the redb-backed
/// embedding table so the graph shape can be rebuilt deterministically
/// without re-running every insert (§4.1 persistence strategy).
#[derive(Serialize, Deserialize)]
struct IndexMetadata {
    dimension: usize,
    m: usize,
    m_max0: usize,
    entry_point: Option<usize>,
    next_id: usize,
    deleted: Vec<usize>,
}

/// Hand-rolled HNSW vector index.
///
/// Noun and verb embeddings share one instance of this type (§9); callers
/// are responsible for mapping their own identifiers to the dense `usize`
/// space this index expects.
pub struct HnswIndex {
    graph: RwLock<Graph>,
    rng: Mutex<SmallRng>,
    metric: Metric,
    m: usize,
    m_max0: usize,
    ef_construction: usize,
    ml: f64,
    dimension: usize,
}

impl HnswIndex {
    /// Creates a new empty HNSW index for vectors of the given dimension.
    pub fn new(dimension: usize, config: &HnswConfig) -> Self {
        Self::with_metric(dimension, config, Metric::Cosine)
    }

    /// Creates a new empty HNSW index using an explicit distance metric.
    pub fn with_metric(dimension: usize, config: &HnswConfig, metric: Metric) -> Self {
        Self {
            graph: RwLock::new(Graph::new()),
            rng: Mutex::new(SmallRng::seed_from_u64(config.seed)),
            metric,
            m: config.m,
            m_max0: config.m_max0,
            ef_construction: config.ef_construction,
            ml: config.ml(),
            dimension,
        }
    }

    fn random_level(&self) -> usize {
        let uniform: f64 = self.rng.lock().expect("rng lock poisoned").gen();
        // Avoid ln(0.0) = -inf by clamping away from the zero boundary.
        let uniform = uniform.max(f64::MIN_POSITIVE);
        (-uniform.ln() * self.ml).floor() as usize
    }

    fn distance(&self, graph: &Graph, a: &[f32], id: usize) -> f32 {
        self.metric.distance(a, graph.embedding(id))
    }

    /// Greedy single-path descent used above layer 0: always step to the
    /// neighbor closest to `query`, stopping when no neighbor improves on
    /// the current best.
    fn greedy_descend(&self, graph: &Graph, query: &[f32], layer: usize, entry: usize) -> usize {
        let mut current = entry;
        let mut current_dist = self.distance(graph, query, current);
        loop {
            let mut improved = false;
            for &neighbor in graph.neighbors(layer, current) {
                let d = self.distance(graph, query, neighbor);
                if d < current_dist {
                    current_dist = d;
                    current = neighbor;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first beam search at a single layer, starting from `entry`,
    /// tracking up to `ef` candidates. Returns results sorted by ascending
    /// distance (closest first).
    fn search_layer(
        &self,
        graph: &Graph,
        query: &[f32],
        layer: usize,
        entry: usize,
        ef: usize,
        filter: Option<&(dyn Fn(usize) -> bool + Sync)>,
    ) -> Vec<Scored> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(entry);

        let entry_dist = self.distance(graph, query, entry);
        let mut candidates: BinaryHeap<std::cmp::Reverse<Scored>> = BinaryHeap::new();
        candidates.push(std::cmp::Reverse(Scored {
            distance: entry_dist,
            id: entry,
        }));

        let mut results: BinaryHeap<Scored> = BinaryHeap::new();
        if !graph.is_deleted(entry) && filter.map(|f| f(entry)).unwrap_or(true) {
            results.push(Scored {
                distance: entry_dist,
                id: entry,
            });
        }

        while let Some(std::cmp::Reverse(current)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && current.distance > worst.distance {
                    break;
                }
            }

            for &neighbor in graph.neighbors(layer, current.id) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance(graph, query, neighbor);
                let should_expand = results.len() < ef
                    || results.peek().map(|w| d < w.distance).unwrap_or(true);
                if should_expand {
                    candidates.push(std::cmp::Reverse(Scored {
                        distance: d,
                        id: neighbor,
                    }));
                }
                // Filtered-out or tombstoned points still get expanded
                // through (they keep the beam connected) but never count
                // toward the result set itself (§4.1).
                if !graph.is_deleted(neighbor) && filter.map(|f| f(neighbor)).unwrap_or(true) {
                    results.push(Scored {
                        distance: d,
                        id: neighbor,
                    });
                    while results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut out: Vec<Scored> = results.into_vec();
        out.sort();
        out
    }

    /// Applies the neighbor-diversity heuristic: keep a candidate only if
    /// it is closer to the new point than to every neighbor already
    /// selected, until `max_neighbors` have been chosen.
    fn select_neighbors_heuristic(
        &self,
        graph: &Graph,
        candidates: Vec<Scored>,
        max_neighbors: usize,
    ) -> Vec<usize> {
        let mut selected: Vec<Scored> = Vec::with_capacity(max_neighbors);
        for candidate in candidates {
            if selected.len() >= max_neighbors {
                break;
            }
            let dominated = selected.iter().any(|s| {
                self.distance(graph, graph.embedding(s.id), candidate.id) < candidate.distance
            });
            if !dominated {
                selected.push(candidate);
            }
        }
        selected.into_iter().map(|s| s.id).collect()
    }

    fn connect(&self, graph: &mut Graph, layer: usize, id: usize, neighbors: &[usize]) {
        let cap = if layer == 0 { self.m_max0 } else { self.m };
        graph.set_neighbors(layer, id, neighbors.to_vec());
        for &neighbor in neighbors {
            let mut back = graph.neighbors(layer, neighbor).to_vec();
            if !back.contains(&id) {
                back.push(id);
            }
            if back.len() > cap {
                let embedding = graph.embedding(neighbor).to_vec();
                let mut scored: Vec<Scored> = back
                    .iter()
                    .map(|&n| Scored {
                        distance: self.distance(graph, &embedding, n),
                        id: n,
                    })
                    .collect();
                scored.sort();
                back = self.select_neighbors_heuristic(graph, scored, cap);
            }
            graph.set_neighbors(layer, neighbor, back);
        }
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&self, id: usize, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(BrainyError::dimension_mismatch(self.dimension, embedding.len()));
        }

        let level = self.random_level();
        let mut graph = self.graph.write().expect("graph lock poisoned");

        if id >= graph.elements.len() {
            graph.elements.resize_with(id + 1, || None);
        }
        graph.elements[id] = Some(Element {
            embedding: embedding.to_vec(),
            level,
            deleted: false,
        });
        graph.active_count += 1;
        while graph.layers.len() < level {
            graph.layers.push(LayerEdges::new());
        }

        let Some(entry_point) = graph.entry_point else {
            graph.entry_point = Some(id);
            return Ok(());
        };

        let top = graph.top_level();
        let mut current = entry_point;
        for layer in (level + 1..=top).rev() {
            current = self.greedy_descend(&graph, embedding, layer, current);
        }

        for layer in (0..=level.min(top)).rev() {
            let candidates =
                self.search_layer(&graph, embedding, layer, current, self.ef_construction, None);
            let max_neighbors = if layer == 0 { self.m_max0 } else { self.m };
            let neighbors =
                self.select_neighbors_heuristic(&graph, candidates.clone(), max_neighbors);
            self.connect(&mut graph, layer, id, &neighbors);
            if let Some(best) = candidates.first() {
                current = best.id;
            }
        }

        if level > top {
            graph.entry_point = Some(id);
        }

        Ok(())
    }

    fn insert_batch(&self, items: &[(&Vec<f32>, usize)]) -> Result<()> {
        for (embedding, id) in items {
            self.insert(*id, embedding)?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(usize, f32)>> {
        self.search_filtered(query, k, ef_search, &|_| true)
    }

    fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: &(dyn Fn(usize) -> bool + Sync),
    ) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(BrainyError::dimension_mismatch(self.dimension, query.len()));
        }

        let graph = self.graph.read().expect("graph lock poisoned");
        let Some(entry_point) = graph.entry_point else {
            return Ok(Vec::new());
        };

        let top = graph.top_level();
        let mut current = entry_point;
        for layer in (1..=top).rev() {
            current = self.greedy_descend(&graph, query, layer, current);
        }

        let ef = ef_search.max(k);
        let mut results = self.search_layer(&graph, query, 0, current, ef, Some(filter));
        results.truncate(k);
        Ok(results.into_iter().map(|s| (s.id, s.distance)).collect())
    }

    fn delete(&self, id: usize) -> Result<()> {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        match graph.elements.get_mut(id).and_then(|e| e.as_mut()) {
            Some(element) if !element.deleted => {
                element.deleted = true;
                graph.active_count = graph.active_count.saturating_sub(1);
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(BrainyError::vector(format!("unknown vector id {id}"))),
        }
    }

    fn hard_delete(&self, id: usize) -> Result<()> {
        let mut graph = self.graph.write().expect("graph lock poisoned");
        if graph.elements.get(id).and_then(|e| e.as_ref()).is_none() {
            return Err(BrainyError::vector(format!("unknown vector id {id}")));
        }
        let level = graph.elements[id].as_ref().unwrap().level;
        graph.elements[id] = None;

        for layer in 0..=level {
            let former_neighbors = graph.neighbors(layer, id).to_vec();
            graph.set_neighbors(layer, id, Vec::new());
            let cap = if layer == 0 { self.m_max0 } else { self.m };

            for &u in &former_neighbors {
                let existing: Vec<usize> =
                    graph.neighbors(layer, u).iter().copied().filter(|&n| n != id).collect();
                let embedding_u = graph.embedding(u).to_vec();

                // Re-stitch: u's surviving neighbors plus id's other former
                // neighbors (id's best-connected peers) are the candidate
                // pool for u's replacement edge(s); the diversity heuristic
                // then re-picks up to `cap` of them (§4.1, §4.8 step b).
                let mut candidates: Vec<Scored> = existing
                    .iter()
                    .copied()
                    .chain(former_neighbors.iter().copied().filter(|&n| {
                        n != u && n != id && !graph.is_deleted(n) && !existing.contains(&n)
                    }))
                    .map(|n| Scored { distance: self.distance(&graph, &embedding_u, n), id: n })
                    .collect();
                candidates.sort();

                let back = self.select_neighbors_heuristic(&graph, candidates, cap);
                graph.set_neighbors(layer, u, back);
            }
        }

        if graph.entry_point == Some(id) {
            graph.entry_point = graph.elements.iter().position(|e| e.is_some());
        }

        Ok(())
    }

    fn is_deleted(&self, id: usize) -> bool {
        self.graph.read().expect("graph lock poisoned").is_deleted(id)
    }

    fn len(&self) -> usize {
        self.graph.read().expect("graph lock poisoned").active_count
    }

    fn save(&self, dir: &Path, name: &str) -> Result<()> {
        let graph = self.graph.read().expect("graph lock poisoned");
        let deleted: Vec<usize> = graph
            .elements
            .iter()
            .enumerate()
            .filter_map(|(id, e)| e.as_ref().filter(|e| e.deleted).map(|_| id))
            .collect();
        let metadata = IndexMetadata {
            dimension: self.dimension,
            m: self.m,
            m_max0: self.m_max0,
            entry_point: graph.entry_point,
            next_id: graph.elements.len(),
            deleted,
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{name}.hnsw.meta"));
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|e| BrainyError::vector(format!("failed to encode index metadata: {e}")))?;
        fs::write(path, json)?;
        Ok(())
    }
}
