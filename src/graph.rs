//! In-memory adjacency store for verbs (§4.3).
//!
//! Mirrors the persisted `VERBS_BY_SOURCE_TABLE` / `VERBS_BY_TARGET_TABLE` /
//! `VERBS_BY_TYPE_TABLE` multimaps (see [`crate::storage::schema`]) as
//! in-memory `HashMap<_, HashSet<VerbId>>` adjacency, the same
//! derived-from-storage pattern the HNSW index uses for its graph: storage
//! is the durability anchor, this structure is rebuilt from it on open.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::types::NounId;
use crate::verb::{VerbDirection, VerbType};
use crate::types::VerbId;

#[derive(Default)]
struct GraphState {
    by_source: HashMap<NounId, HashSet<VerbId>>,
    by_target: HashMap<NounId, HashSet<VerbId>>,
    by_type: HashMap<VerbType, HashSet<VerbId>>,
}

/// Adjacency index over verbs: source/target/type lookups.
pub struct GraphStore {
    state: RwLock<GraphState>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self { state: RwLock::new(GraphState::default()) }
    }

    /// Records a verb's adjacency. Idempotent: inserting the same verb
    /// twice with the same endpoints is a no-op.
    pub fn insert(&self, verb_id: VerbId, source: NounId, target: NounId, verb_type: VerbType) {
        let mut state = self.state.write().unwrap();
        state.by_source.entry(source).or_default().insert(verb_id);
        state.by_target.entry(target).or_default().insert(verb_id);
        state.by_type.entry(verb_type).or_default().insert(verb_id);
    }

    /// Removes a verb's adjacency (hard-delete or cascade-delete).
    pub fn remove(&self, verb_id: VerbId, source: NounId, target: NounId, verb_type: VerbType) {
        let mut state = self.state.write().unwrap();
        if let Some(set) = state.by_source.get_mut(&source) {
            set.remove(&verb_id);
        }
        if let Some(set) = state.by_target.get_mut(&target) {
            set.remove(&verb_id);
        }
        if let Some(set) = state.by_type.get_mut(&verb_type) {
            set.remove(&verb_id);
        }
    }

    /// Verbs where `noun` is the source.
    pub fn verbs_by_source(&self, noun: NounId) -> Vec<VerbId> {
        self.state.read().unwrap().by_source.get(&noun).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    /// Verbs where `noun` is the target.
    pub fn verbs_by_target(&self, noun: NounId) -> Vec<VerbId> {
        self.state.read().unwrap().by_target.get(&noun).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    /// All verbs tagged with `verb_type`.
    pub fn verbs_by_type(&self, verb_type: VerbType) -> Vec<VerbId> {
        self.state.read().unwrap().by_type.get(&verb_type).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    /// Verbs incident to `noun` in the given direction, deduplicated when
    /// `direction` is [`VerbDirection::Both`] and a verb is a self-loop
    /// between the noun and itself is impossible (self-relations are
    /// rejected at validation), so a plain concatenation is safe.
    pub fn verbs_for_noun(&self, noun: NounId, direction: VerbDirection) -> Vec<VerbId> {
        match direction {
            VerbDirection::Outgoing => self.verbs_by_source(noun),
            VerbDirection::Incoming => self.verbs_by_target(noun),
            VerbDirection::Both => {
                let mut combined = self.verbs_by_source(noun);
                combined.extend(self.verbs_by_target(noun));
                combined
            }
        }
    }

    /// Total number of distinct verbs tracked (by source-side adjacency).
    pub fn len(&self) -> usize {
        self.state.read().unwrap().by_source.values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
