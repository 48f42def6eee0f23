//! Vector index abstractions for semantic search.
//!
//! This module provides a trait-based abstraction over vector indexes.
//! The primary implementation, [`HnswIndex`], is a hand-rolled hierarchical
//! navigable small-world graph (§4.1) — there is no external ANN
//! dependency; the layered-graph construction, greedy search, and neighbor
//! diversity heuristic all live in [`hnsw`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │         VectorIndex trait         │
//! └──────────┬───────────────────────┘
//!            │
//!    ┌───────┴────────┐
//!    │   HnswIndex    │  (hand-rolled, see hnsw.rs)
//!    └────────────────┘
//! ```
//!
//! Embeddings stored by the storage engine are the **source of truth**.
//! The HNSW index is a derived, rebuildable structure — if its sidecar
//! files are missing or corrupt, the facade rebuilds it from stored
//! embeddings on open.
//!
//! Noun and verb embeddings share a single index (§9): both are bridged
//! to the same `usize` key space via `EntityId`.

pub mod distance;
mod hnsw;

pub use distance::Metric;
pub use hnsw::HnswIndex;

use std::path::Path;

use crate::error::Result;

/// Vector index trait for approximate nearest neighbor search.
///
/// Implementations must be `Send + Sync` for use inside `BrainyDb`.
/// IDs are `usize`; the facade maintains the bidirectional mapping between
/// these internal ids and [`crate::types::EntityId`].
///
/// All mutating methods (`insert`, `delete`) take `&self` and use interior
/// mutability, so reads can proceed concurrently with writes that are
/// serialized internally.
pub trait VectorIndex: Send + Sync {
    /// Inserts a single vector with the given ID.
    fn insert(&self, id: usize, embedding: &[f32]) -> Result<()>;

    /// Inserts a batch of vectors.
    ///
    /// More efficient than individual inserts for large batches due to
    /// reduced locking overhead.
    fn insert_batch(&self, items: &[(&Vec<f32>, usize)]) -> Result<()>;

    /// Searches for the k nearest neighbors to the query vector.
    ///
    /// Returns `(id, distance)` pairs sorted by distance ascending
    /// (closest first).
    fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(usize, f32)>>;

    /// Searches with a filter predicate applied during traversal.
    ///
    /// Only points where `filter(id)` returns `true` count toward the
    /// requested `k`, but the beam still expands through filtered-out
    /// points so the search doesn't dead-end when a whole neighborhood
    /// fails the filter (§4.1, "filter-during-traversal").
    fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: &(dyn Fn(usize) -> bool + Sync),
    ) -> Result<Vec<(usize, f32)>>;

    /// Marks an ID as deleted (soft-delete, tombstone).
    ///
    /// The vector remains in the graph but is excluded from search
    /// results. HNSW graphs don't support cheap point removal — removing
    /// a node breaks the proximity edges other nodes rely on for
    /// navigation.
    fn delete(&self, id: usize) -> Result<()>;

    /// Physically removes a tombstoned ID, re-stitching its neighbors'
    /// edge lists so graph connectivity is preserved (§4.8, hard delete).
    ///
    /// # Errors
    /// Returns an error if `id` was never inserted.
    fn hard_delete(&self, id: usize) -> Result<()>;

    /// Returns true if the given ID is marked as deleted.
    fn is_deleted(&self, id: usize) -> bool;

    /// Returns the number of active (non-deleted) vectors.
    fn len(&self) -> usize;

    /// Returns true if the index has no active vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persists index metadata to disk.
    fn save(&self, dir: &Path, name: &str) -> Result<()>;
}
