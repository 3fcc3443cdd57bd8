//! Short-lived memoization of chat replies.
//!
//! Cache key is a SHA-256 digest of `(device_id, message, query)`. Entries
//! expire a fixed TTL after insertion and are recomputed on the next access.
//! Expired entries are swept whenever a new entry is stored; there is no
//! other eviction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;

/// Default time-to-live for a cached reply.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A single cached reply.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The reply text.
    pub response: String,
    /// Unix timestamp (milliseconds) when the entry was stored.
    pub created_at: i64,
    /// Number of cache hits for this entry.
    pub hit_count: u32,
}

/// Result of [`ResponseCache::get_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    pub value: String,
    /// `true` when the value came from the cache.
    pub hit: bool,
}

/// In-memory reply cache with TTL expiry.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl_ms: i64,
}

impl ResponseCache {
    /// Create a cache whose entries live for `ttl`.
    ///
    /// A zero TTL disables caching: every lookup misses.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Build a deterministic cache key: SHA-256 of `(device_id, message, query)`.
    ///
    /// Uses length-prefixed encoding so that field boundaries cannot be
    /// shifted (e.g. `device="a|b"` vs `device="a", message="|b"`). An absent
    /// query and an empty query are distinct.
    pub fn cache_key(device_id: &str, message: &str, query: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update((device_id.len() as u64).to_le_bytes());
        hasher.update(device_id.as_bytes());
        hasher.update((message.len() as u64).to_le_bytes());
        hasher.update(message.as_bytes());
        match query {
            Some(q) => {
                hasher.update([1u8]);
                hasher.update((q.len() as u64).to_le_bytes());
                hasher.update(q.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hex::encode(hasher.finalize())
    }

    /// Look up a live entry. Expired entries are removed and reported as absent.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let now_ms = now.timestamp_millis();
        let mut entries = self.lock();
        let expired = entries.get(key).map(|e| self.is_expired(e, now_ms));
        match expired {
            Some(true) => {
                debug!(key = %short(key), "Cache entry expired, removing");
                entries.remove(key);
                None
            }
            Some(false) => entries.get_mut(key).map(|entry| {
                entry.hit_count = entry.hit_count.saturating_add(1);
                entry.response.clone()
            }),
            None => None,
        }
    }

    /// Store a reply, replacing any previous entry for `key`.
    pub fn put(&self, key: String, response: String, now: DateTime<Utc>) {
        if self.ttl_ms == 0 {
            return;
        }
        let now_ms = now.timestamp_millis();
        let mut entries = self.lock();
        entries.retain(|_, e| !self.is_expired(e, now_ms));
        entries.insert(
            key,
            CacheEntry {
                response,
                created_at: now_ms,
                hit_count: 0,
            },
        );
    }

    /// Return the cached value for `key`, or run `compute` and cache its result.
    ///
    /// Only `Ok` results are stored, stamped with the clock reading taken
    /// after `compute` finishes. The lock is released while `compute` runs,
    /// so concurrent misses for the same key may each compute.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        clock: &dyn Clock,
        compute: F,
    ) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(value) = self.get(key, clock.now()) {
            debug!(key = %short(key), "Cache hit");
            return Ok(CacheLookup { value, hit: true });
        }
        let value = compute().await?;
        self.put(key.to_string(), value.clone(), clock.now());
        Ok(CacheLookup { value, hit: false })
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            total_entries: entries.len(),
            total_hits: entries.values().map(|e| u64::from(e.hit_count)).sum(),
            ttl_secs: (self.ttl_ms / 1000) as u64,
        }
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Return the number of entries currently in the cache.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Return `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // -- private helpers ---------------------------------------------------

    fn is_expired(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        now_ms.saturating_sub(entry.created_at) >= self.ttl_ms
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn short(key: &str) -> &str {
    &key[..8.min(key.len())]
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Number of entries currently in the cache (live or not yet swept).
    pub total_entries: usize,
    /// Cumulative number of cache hits across current entries.
    pub total_hits: u64,
    pub ttl_secs: u64,
}
