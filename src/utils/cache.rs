//! In-Memory TTL Cache
//!
//! Thread-safe cache for registry lookups. Domains are looked up over and
//! over by different users; registration dates do not change within a day.
//!
//! Features:
//! - TTL-based expiration
//! - Key normalization (lowercase)
//! - Cache HIT/MISS logging
//! - Periodic sweep of expired entries
//! - Thread-safe with DashMap

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache entry with creation timestamp
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Shared TTL cache keyed by lowercase string
#[derive(Clone)]
pub struct TtlCache<V> {
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
        }
    }

    #[inline]
    fn normalize_key(key: &str) -> String {
        key.trim().to_lowercase()
    }

    /// Some(value) on a fresh hit; expired entries are evicted
    pub fn get(&self, key: &str) -> Option<V> {
        let key = Self::normalize_key(key);

        let fresh = match self.store.get(&key) {
            Some(entry) if !entry.is_expired() => {
                debug!(
                    "✅ Registry cache hit: {} ({}s left)",
                    key,
                    entry.remaining_ttl().as_secs()
                );
                Some(entry.value.clone())
            }
            Some(_) => None,
            None => {
                debug!("📭 Registry cache miss: {}", key);
                return None;
            }
        };

        if fresh.is_none() {
            // Guard from the lookup above is gone, safe to take the write lock
            self.store.remove(&key);
            debug!("📭 Registry cache expired: {}", key);
        }
        fresh
    }

    pub fn set(&self, key: &str, value: V) {
        let key = Self::normalize_key(key);
        self.store.insert(
            key.clone(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        debug!("💾 Cached registry answer for {} ({}s)", key, self.ttl.as_secs());
    }

    /// Drop all expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        // Concurrent inserts during retain can grow the map
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("🧹 Registry cache: {} expired entries dropped", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
