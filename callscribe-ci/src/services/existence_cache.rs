//! Time-bounded in-memory caches for persistence lookups
//!
//! Repeated batch runs ask "is this call already persisted" far more often
//! than the answer changes; these caches make that check cheap. Entries
//! expire after a fixed TTL and readers treat expired entries as absent,
//! so a stale answer is never trusted over the backing store.
//!
//! Eviction is a lazy sweep: once a cache is over its bound, every Nth
//! insert walks the map and drops expired entries. No background timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default entry lifetime
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Sweep every Nth insert while over the size bound
const SWEEP_STRIDE: usize = 50;

/// Existence-only cache bound (entries are one bool, keep many)
const EXISTENCE_CACHE_BOUND: usize = 1000;

/// Full-payload cache bound (entries carry whole transcripts, keep few)
const PAYLOAD_CACHE_BOUND: usize = 200;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// TTL cache with interior locking
///
/// Constructed once at process start and passed by reference; the lock
/// lives inside the cache so callers never coordinate externally.
pub struct TtlCache<V: Clone> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Get a live entry; expired entries are reported as absent
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );

        let len = entries.len();
        if len > self.max_entries && len % SWEEP_STRIDE == 0 {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
            tracing::debug!(
                before = len,
                after = entries.len(),
                "Cache sweep evicted expired entries"
            );
        }
    }

    pub async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// The two pipeline caches, constructed once and injected via `AppState`
pub struct PipelineCaches {
    /// Lightweight "does a row exist for this call id" cache
    pub existence: TtlCache<bool>,
    /// Full persisted-payload cache (JSON row snapshot)
    pub payload: TtlCache<serde_json::Value>,
}

impl PipelineCaches {
    pub fn new() -> Self {
        Self {
            existence: TtlCache::new(DEFAULT_TTL, EXISTENCE_CACHE_BOUND),
            payload: TtlCache::new(DEFAULT_TTL, PAYLOAD_CACHE_BOUND),
        }
    }
}

impl Default for PipelineCaches {
    fn default() -> Self {
        Self::new()
    }
}
