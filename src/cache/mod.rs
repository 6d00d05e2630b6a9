/*!
 * Decision Cache
 * LRU + TTL cache of permission decisions keyed by (user, path, operation)
 *
 * Paths are stored in canonical form; any policy mutation must clear the
 * whole cache through the maintenance API.
 */

use crate::policy::Operation;
use ahash::RandomState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cache key for one decision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    /// Canonical path, as produced by the pattern module's cleaning
    pub path: String,
    pub operation: Operation,
}

impl CacheKey {
    pub fn new(
        user_id: impl Into<String>,
        path: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            path: path.into(),
            operation,
        }
    }
}

struct CacheSlot {
    allowed: bool,
    expires_at: Instant,
    /// Recency stamp; the smallest stamp in the index is the LRU entry
    sequence: u64,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheSlot, RandomState>,
    recency: BTreeMap<u64, CacheKey>,
    next_sequence: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &CacheKey) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(slot) = self.entries.get_mut(key) {
            self.recency.remove(&slot.sequence);
            slot.sequence = sequence;
            self.recency.insert(sequence, key.clone());
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(slot) = self.entries.remove(key) {
            self.recency.remove(&slot.sequence);
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((&sequence, _)) = self.recency.iter().next() else {
            return false;
        };
        if let Some(key) = self.recency.remove(&sequence) {
            self.entries.remove(&key);
        }
        true
    }
}

/// Shared, capacity-bounded decision cache.
///
/// Lookups promote to most-recently-used; inserts at capacity evict exactly
/// the least-recently-used entry. Expired entries are removed on access and
/// count as misses. When disabled, lookups miss and stores are no-ops.
pub struct DecisionCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    enabled: AtomicBool,
}

impl DecisionCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity_and_hasher(max_size, RandomState::new()),
                recency: BTreeMap::new(),
                next_sequence: 0,
            }),
            max_size,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Look up a cached decision, promoting it to most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        if !self.enabled.load(Ordering::Relaxed) {
            return None;
        }

        let mut inner = self.inner.lock();
        let Some(slot) = inner.entries.get(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if Instant::now() >= slot.expires_at {
            inner.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let allowed = slot.allowed;
        inner.touch(key);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(allowed)
    }

    /// Store a decision, evicting the LRU entry when at capacity.
    /// Storing over an existing key updates it in place and promotes it.
    pub fn set(&self, key: CacheKey, allowed: bool) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }

        let expires_at = Instant::now() + self.ttl;
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.entries.get_mut(&key) {
            slot.allowed = allowed;
            slot.expires_at = expires_at;
            inner.touch(&key);
            return;
        }

        if inner.entries.len() >= self.max_size && inner.evict_oldest() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.recency.insert(sequence, key.clone());
        inner.entries.insert(
            key,
            CacheSlot {
                allowed,
                expires_at,
                sequence,
            },
        );
    }

    /// Drop every cached decision. Counters are preserved.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    /// Drop decisions matching both filters; an absent or empty filter
    /// matches everything. Idempotent.
    pub fn invalidate(&self, user_id: Option<&str>, path_prefix: Option<&str>) {
        let user_id = user_id.filter(|s| !s.is_empty());
        let path_prefix = path_prefix.filter(|s| !s.is_empty());

        let mut inner = self.inner.lock();
        let doomed: Vec<CacheKey> = inner
            .entries
            .keys()
            .filter(|key| {
                user_id.map_or(true, |user| key.user_id == user)
                    && path_prefix.map_or(true, |prefix| key.path.starts_with(prefix))
            })
            .cloned()
            .collect();

        for key in doomed {
            inner.remove(&key);
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.inner.lock().entries.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            size,
            max_size: self.max_size,
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// hits / (hits + misses), 0.0 when nothing was looked up
    pub hit_rate: f64,
}
