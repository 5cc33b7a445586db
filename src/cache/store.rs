//! Cache storage.
//!
//! `CacheStore` is the key-value contract the rest of the crate talks to;
//! `MemoryStore` is the in-process LRU backend with per-entry time-to-live.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "newsportal_cache_hit_total";
const METRIC_CACHE_MISS: &str = "newsportal_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "newsportal_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cached value for `{key}` could not be encoded or decoded: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Key-value cache backend.
///
/// Deleting an absent key succeeds.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Read and decode a JSON value stored under `key`.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: CacheKey,
) -> Result<Option<T>, CacheError> {
    let name = key.to_string();
    let Some(raw) = store.get(&name).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| CacheError::Codec { key: name, source })
}

/// Encode `value` as JSON and store it under `key`.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: CacheKey,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let name = key.to_string();
    let encoded = serde_json::to_vec(value).map_err(|source| CacheError::Codec {
        key: name.clone(),
        source,
    })?;
    store.set(&name, Bytes::from(encoded), ttl).await
}

struct StoredEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process cache backend with LRU eviction.
///
/// A zero TTL stores the entry without expiry; expired entries are dropped
/// lazily on read.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let now = Instant::now();

        let hit = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        match hit {
            Some(value) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                Ok(Some(value))
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        // A TTL too large to represent never expires.
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        let evicted = rw_write(&self.entries, SOURCE, "set")
            .push(key.to_string(), StoredEntry { value, expires_at })
            .filter(|(evicted_key, _)| evicted_key != key);

        if evicted.is_some() {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}
