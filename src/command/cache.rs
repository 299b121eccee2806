//! Time-bounded cache for read-only command results
//!
//! Entries carry their own TTL and are dropped when a read finds them stale.
//! There is no sweeper. Concurrent writers to one key are last-writer-wins.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// Hit/miss counters, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Shared key→value store with expire-on-read semantics
#[derive(Debug)]
pub struct ResponseCache<V> {
    inner: Mutex<Inner<V>>,
}

#[derive(Debug)]
struct Inner<V> {
    entries: AHashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: AHashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Fresh value for `key`; a stale entry is evicted and reported absent
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(expired) = inner.entries.get(key).map(|entry| entry.is_expired_at(now)) else {
            inner.misses += 1;
            return None;
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            return None;
        }

        inner.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.insert(key.into(), entry);
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.clear();
    }

    /// Number of stored entries, including ones not yet found stale
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
