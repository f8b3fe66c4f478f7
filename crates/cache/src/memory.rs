//! In-memory cache with LRU eviction and lazy TTL expiry.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::{Cache, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Process-local cache for single-instance deployments.
///
/// Expired entries are dropped when they are next read. Once `max_entries`
/// is reached the least recently used entry is evicted.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<Mutex<LruCache<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_entries` keys (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Number of live and not-yet-collected entries.
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut store = self.store.lock().await;

        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut store = self.store.lock().await;
        store.put(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        store.pop(key);
        Ok(())
    }
}
