//! Bidirectional mapping between stable [`EntityId`]s and the `usize` keys
//! the shared HNSW index uses internally (§9: "Noun and verb embeddings
//! share a single index... both are bridged to the same `usize` key space
//! via `EntityId`").
//!
//! Grounded on the same `RwLock`-protected `HashMap` pattern used by
//! [`crate::graph::GraphStore`] and [`crate::cache::UnifiedCache`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::types::EntityId;

#[derive(Default)]
struct BridgeState {
    forward: HashMap<EntityId, usize>,
    backward: HashMap<usize, EntityId>,
}

/// Assigns and looks up the `usize` keys an HNSW index stores points under.
pub struct IdBridge {
    state: RwLock<BridgeState>,
    next: AtomicUsize,
}

impl Default for IdBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl IdBridge {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BridgeState::default()),
            next: AtomicUsize::new(0),
        }
    }

    /// Returns the existing key for `entity`, assigning a fresh one if this
    /// is the first time it's been seen.
    pub fn key_for(&self, entity: EntityId) -> usize {
        if let Some(key) = self.state.read().unwrap().forward.get(&entity) {
            return *key;
        }
        let mut state = self.state.write().unwrap();
        if let Some(key) = state.forward.get(&entity) {
            return *key;
        }
        let key = self.next.fetch_add(1, Ordering::SeqCst);
        state.forward.insert(entity, key);
        state.backward.insert(key, entity);
        key
    }

    /// Registers `entity` under an explicit `key`, used when rebuilding the
    /// bridge from storage on open so ids are stable across restarts.
    pub fn register(&self, entity: EntityId, key: usize) {
        let mut state = self.state.write().unwrap();
        state.forward.insert(entity, key);
        state.backward.insert(key, entity);
        let mut next = self.next.load(Ordering::SeqCst);
        if key >= next {
            next = key + 1;
            self.next.store(next, Ordering::SeqCst);
        }
    }

    /// Looks up the key for `entity`, if one has been assigned.
    pub fn lookup(&self, entity: EntityId) -> Option<usize> {
        self.state.read().unwrap().forward.get(&entity).copied()
    }

    /// Resolves a `usize` key back to its `EntityId`.
    pub fn resolve(&self, key: usize) -> Option<EntityId> {
        self.state.read().unwrap().backward.get(&key).copied()
    }

    /// Removes an entity's mapping (hard-delete bookkeeping).
    pub fn remove(&self, entity: EntityId) {
        let mut state = self.state.write().unwrap();
        if let Some(key) = state.forward.remove(&entity) {
            state.backward.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
