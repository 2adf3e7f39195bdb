//! Content-addressed, time-expiring embedding cache.
//!
//! Keys are `{provider}_{model}_{hash(text)}`. Expiration is lazy: an entry
//! older than `max_age` is evicted when a lookup touches it, never by a
//! background sweep. The cache is unbounded unless a maximum entry count is
//! configured, in which case least-recently-used entries are dropped first.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::trace;

use legal_types::{ProviderConfig, ProviderType};

use crate::vector::EmbeddingVector;

struct CacheEntry {
    vector: EmbeddingVector,
    created_at: DateTime<Utc>,
}

/// Thread-safe embedding cache with lazy expiration.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_age: Duration,
}

impl EmbeddingCache {
    /// Create an unbounded cache.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_age,
        }
    }

    /// Create a cache holding at most `max_entries` vectors.
    pub fn with_capacity(max_age: Duration, max_entries: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(max_entries)),
            max_age,
        }
    }

    /// Create a cache sized by a provider configuration.
    pub fn from_config(config: &ProviderConfig) -> Self {
        match config.max_cache_entries.and_then(NonZeroUsize::new) {
            Some(cap) => Self::with_capacity(config.cache_expiration(), cap),
            None => Self::new(config.cache_expiration()),
        }
    }

    /// Look up a vector. Expired entries are evicted and reported as absent.
    pub fn get(&self, key: &str) -> Option<EmbeddingVector> {
        self.get_at(key, Utc::now())
    }

    /// Store a vector, replacing any existing entry for the key.
    pub fn set(&self, key: impl Into<String>, vector: EmbeddingVector) {
        self.set_at(key.into(), vector, Utc::now());
    }

    /// Whether a live entry exists for the key.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Utc::now())
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<EmbeddingVector> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if !self.is_expired(entry, now) => return Some(entry.vector.clone()),
            Some(_) => {}
            None => return None,
        }
        trace!(key, "Evicting expired cache entry");
        entries.pop(key);
        None
    }

    fn set_at(&self, key: String, vector: EmbeddingVector, now: DateTime<Utc>) {
        self.lock().put(
            key,
            CacheEntry {
                vector,
                created_at: now,
            },
        );
    }

    fn has_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.lock();
        let expired = match entries.peek(key) {
            Some(entry) => self.is_expired(entry, now),
            None => return false,
        };
        if expired {
            entries.pop(key);
        }
        !expired
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // A negative age (clock moved backwards) counts as fresh.
        match now.signed_duration_since(entry.created_at).to_std() {
            Ok(age) => age > self.max_age,
            Err(_) => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 32-bit rolling string hash (`h = h * 31 + unit`) over UTF-16 code units.
///
/// Non-cryptographic; collisions are an accepted cache-correctness risk.
pub fn string_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Derive the cache key for a text embedded by a given provider and model.
pub fn cache_key(provider: ProviderType, model: &str, text: &str) -> String {
    format!("{}_{}_{}", provider, model, string_hash(text))
}
