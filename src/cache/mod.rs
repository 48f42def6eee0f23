//! The Unified Cache (§4.5): a single bounded-size cache shared by the
//! HNSW index, the metadata index, and embedding lookups.
//!
//! Grounded on the same `RwLock`/`Mutex`-protected in-memory state pattern
//! used by [`crate::vector::HnswIndex`] and [`crate::graph::GraphStore`],
//! plus a request-coalescing in-flight table (a `Mutex<HashMap<_, Arc<_>>>`)
//! so concurrent misses on the same key share one load rather than
//! stampeding the loader: every waiter blocks on the same per-key mutex the
//! loader holds while it runs, so whoever was first simply finishes first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::types::Timestamp;

/// Which subsystem an entry belongs to, for fairness accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEntryType {
    Hnsw,
    Metadata,
    Embedding,
    Other,
}

struct CacheEntry {
    entry_type: CacheEntryType,
    payload: Arc<[u8]>,
    size_bytes: u64,
    rebuild_cost: u64,
    access_count: u64,
    last_access: Timestamp,
}

impl CacheEntry {
    /// `access_count / max(rebuild_cost, 1)` — lower means a cheaper-to-keep,
    /// less-valuable entry; the minimum-value entry is evicted first.
    fn value_score(&self) -> f64 {
        self.access_count as f64 / self.rebuild_cost.max(1) as f64
    }
}

enum LoadState {
    Pending,
    Ready(Arc<[u8]>),
}

struct InFlight {
    state: Mutex<LoadState>,
}

/// Shared cache for HNSW subgraph slices, metadata index pages, embedding
/// outputs, and anything else worth memoizing behind a byte-budget.
pub struct UnifiedCache {
    entries: Mutex<HashMap<Vec<u8>, CacheEntry>>,
    in_flight: Mutex<HashMap<Vec<u8>, Arc<InFlight>>>,
    current_size: AtomicU64,
    config: CacheConfig,
}

impl UnifiedCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            current_size: AtomicU64::new(0),
            config,
        }
    }

    /// Looks up `key` without triggering a load. Bumps the entry's access
    /// statistics on hit.
    pub fn get(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_access = Timestamp::now();
        Some(entry.payload.clone())
    }

    /// Looks up `key`, loading it via `loader` on miss. Concurrent misses
    /// for the same key share a single call to `loader` (request
    /// coalescing, §4.5): every caller blocks on the same per-key mutex, so
    /// whichever thread grabs it first runs `loader` while the rest wait,
    /// then wake up and observe the result it stored.
    pub fn get_or_load(
        &self,
        key: &[u8],
        entry_type: CacheEntryType,
        rebuild_cost: u64,
        loader: impl FnOnce() -> Result<Vec<u8>>,
    ) -> Result<Arc<[u8]>> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let in_flight = {
            let mut table = self.in_flight.lock().unwrap();
            table
                .entry(key.to_vec())
                .or_insert_with(|| Arc::new(InFlight { state: Mutex::new(LoadState::Pending) }))
                .clone()
        };

        let mut state = in_flight.state.lock().unwrap();
        if let LoadState::Ready(bytes) = &*state {
            let bytes = bytes.clone();
            drop(state);
            self.in_flight.lock().unwrap().remove(key);
            return Ok(bytes);
        }

        match loader() {
            Ok(bytes) => {
                let payload: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
                *state = LoadState::Ready(payload.clone());
                drop(state);
                self.insert(key.to_vec(), entry_type, payload.clone(), rebuild_cost);
                self.in_flight.lock().unwrap().remove(key);
                Ok(payload)
            }
            Err(e) => {
                drop(state);
                self.in_flight.lock().unwrap().remove(key);
                Err(e)
            }
        }
    }

    /// Inserts a freshly-loaded entry, evicting as needed to stay within
    /// `max_size_bytes`.
    pub fn insert(&self, key: Vec<u8>, entry_type: CacheEntryType, payload: Arc<[u8]>, rebuild_cost: u64) {
        let size_bytes = payload.len() as u64;
        self.make_room(size_bytes);
        let entry = CacheEntry {
            entry_type,
            payload,
            size_bytes,
            rebuild_cost,
            access_count: 0,
            last_access: Timestamp::now(),
        };
        let mut entries = self.entries.lock().unwrap();
        if let Some(old) = entries.insert(key, entry) {
            self.current_size.fetch_sub(old.size_bytes, Ordering::Relaxed);
        }
        self.current_size.fetch_add(size_bytes, Ordering::Relaxed);
    }

    /// Removes an entry, e.g. on mutation of the underlying data.
    pub fn invalidate(&self, key: &[u8]) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(old) = entries.remove(key) {
            self.current_size.fetch_sub(old.size_bytes, Ordering::Relaxed);
        }
    }

    /// Evicts minimum-value entries until `current_size + incoming <=
    /// max_size_bytes`.
    ///
    /// In size-aware mode (the default), evicts the smallest set of
    /// victims (ascending value-score) whose combined size covers the
    /// required free bytes, rather than stopping after the single
    /// lowest-score entry.
    fn make_room(&self, incoming: u64) {
        let max = self.config.max_size_bytes;
        if max == 0 {
            return;
        }
        let current = self.current_size.load(Ordering::Relaxed);
        if current + incoming <= max {
            return;
        }
        let needed = (current + incoming) - max;
        let mut entries = self.entries.lock().unwrap();
        let mut candidates: Vec<(Vec<u8>, f64, u64)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.value_score(), v.size_bytes))
            .collect();
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut freed = 0u64;
        for (key, _, size) in candidates {
            if freed >= needed {
                break;
            }
            if let Some(removed) = entries.remove(&key) {
                self.current_size.fetch_sub(removed.size_bytes, Ordering::Relaxed);
                freed += size;
            }
            if !self.config.size_aware_eviction {
                break;
            }
        }
    }

    /// Runs the fairness monitor (§4.5): if any entry type holds a
    /// disproportionate share of bytes relative to its share of accesses,
    /// force-evicts its lowest-value entries.
    pub fn run_fairness_check(&self) {
        let mut entries = self.entries.lock().unwrap();
        let total_bytes: u64 = entries.values().map(|e| e.size_bytes).sum();
        let total_accesses: u64 = entries.values().map(|e| e.access_count).sum();
        if total_bytes == 0 || total_accesses == 0 {
            return;
        }

        let mut by_type: HashMap<CacheEntryType, (u64, u64, Vec<Vec<u8>>)> = HashMap::new();
        for (key, entry) in entries.iter() {
            let bucket = by_type.entry(entry.entry_type).or_insert((0, 0, Vec::new()));
            bucket.0 += entry.size_bytes;
            bucket.1 += entry.access_count;
            bucket.2.push(key.clone());
        }

        for (_, (bytes, accesses, mut keys)) in by_type {
            let byte_share = bytes as f64 / total_bytes as f64;
            let access_share = accesses as f64 / total_accesses as f64;
            if byte_share >= self.config.fairness_byte_share_threshold
                && access_share < self.config.fairness_access_share_threshold
            {
                keys.sort_by(|a, b| {
                    let score_a = entries.get(a).map(CacheEntry::value_score).unwrap_or(0.0);
                    let score_b = entries.get(b).map(CacheEntry::value_score).unwrap_or(0.0);
                    score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
                });
                let evict_count = (keys.len() as f64 * 0.2).ceil() as usize;
                for key in keys.into_iter().take(evict_count.max(1)) {
                    if let Some(removed) = entries.remove(&key) {
                        self.current_size.fetch_sub(removed.size_bytes, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_size_bytes(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrainyError;
    use std::sync::Barrier;
    use std::thread;

    fn test_config() -> CacheConfig {
        CacheConfig { max_size_bytes: 1024, ..Default::default() }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = UnifiedCache::new(test_config());
        cache.insert(b"k".to_vec(), CacheEntryType::Metadata, Arc::from(vec![1, 2, 3].into_boxed_slice()), 1);
        assert_eq!(cache.get(b"k").map(|v| v.to_vec()), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_invalidate() {
        let cache = UnifiedCache::new(test_config());
        cache.insert(b"k".to_vec(), CacheEntryType::Metadata, Arc::from(vec![1].into_boxed_slice()), 1);
        cache.invalidate(b"k");
        assert!(cache.get(b"k").is_none());
    }

    #[test]
    fn test_eviction_under_pressure() {
        let config = CacheConfig { max_size_bytes: 10, ..Default::default() };
        let cache = UnifiedCache::new(config);
        cache.insert(b"a".to_vec(), CacheEntryType::Other, Arc::from(vec![0u8; 6].into_boxed_slice()), 1);
        cache.insert(b"b".to_vec(), CacheEntryType::Other, Arc::from(vec![0u8; 6].into_boxed_slice()), 1);
        assert!(cache.current_size_bytes() <= 10);
    }

    #[test]
    fn test_get_or_load_populates_cache() {
        let cache = UnifiedCache::new(test_config());
        let loaded = cache
            .get_or_load(b"k", CacheEntryType::Embedding, 5, || Ok(vec![9, 9]))
            .unwrap();
        assert_eq!(loaded.to_vec(), vec![9, 9]);
        assert_eq!(cache.get(b"k").map(|v| v.to_vec()), Some(vec![9, 9]));
    }

    #[test]
    fn test_get_or_load_propagates_loader_error() {
        let cache = UnifiedCache::new(test_config());
        let result = cache.get_or_load(b"k", CacheEntryType::Embedding, 5, || {
            Err(BrainyError::embedding("boom"))
        });
        assert!(result.is_err());
        assert!(cache.get(b"k").is_none());
    }

    #[test]
    fn test_coalescing_calls_loader_once_for_concurrent_misses() {
        let cache = Arc::new(UnifiedCache::new(test_config()));
        let call_count = Arc::new(AtomicU64::new(0));
        let barrier = Arc::new(Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            let call_count = call_count.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_load(b"shared", CacheEntryType::Hnsw, 1, || {
                        call_count.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        Ok(vec![42])
                    })
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.join().unwrap().to_vec(), vec![42]);
        }
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fairness_check_evicts_dominant_low_access_type() {
        let config = CacheConfig { max_size_bytes: 10_000, ..Default::default() };
        let cache = UnifiedCache::new(config);
        for i in 0..10 {
            cache.insert(
                format!("hnsw{i}").into_bytes(),
                CacheEntryType::Hnsw,
                Arc::from(vec![0u8; 100].into_boxed_slice()),
                1,
            );
        }
        let key = b"meta".to_vec();
        cache.insert(key.clone(), CacheEntryType::Metadata, Arc::from(vec![0u8; 10].into_boxed_slice()), 1);
        for _ in 0..100 {
            cache.get(&key);
        }
        cache.run_fairness_check();
        assert!(cache.len() < 11, "expected low-access dominant-bytes type to be trimmed");
    }
}
