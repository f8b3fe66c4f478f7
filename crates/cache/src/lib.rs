//! Key-value cache handles used by the cache-aside layers.
//!
//! Every backend implements [`Cache`]: byte values, optional TTL, single-key
//! delete. Expiry is the backend's job; callers never inspect timestamps.
//!
//! # Backends
//!
//! - `memory` (default): process-local LRU map with lazy TTL expiry
//! - `redis` (feature `redis`): shared Redis instance via a connection manager
//! - `disabled`: every lookup misses and every write is dropped

mod disabled;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_impl;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use disabled::DisabledCache;
pub use error::{CacheError, Result};
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_impl::RedisCache;
pub use settings::{CacheBackend, CacheSettings};

/// Trait for basic cache operations.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets a value from the cache by key. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Sets a value in the cache with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Deletes a value from the cache by key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Injected cache handle shared by every consumer.
pub type SharedCache = Arc<dyn Cache>;

/// A handle that never stores anything.
pub fn disabled() -> SharedCache {
    Arc::new(DisabledCache)
}

/// Build the configured cache handle.
///
/// Never fails: an unreachable or unavailable backend degrades to
/// [`DisabledCache`] so that reads fall through to the store.
pub async fn connect(settings: &CacheSettings) -> SharedCache {
    match settings.backend {
        CacheBackend::Memory => {
            tracing::info!(
                max_entries = settings.max_entries,
                "using in-memory cache backend"
            );
            Arc::new(MemoryCache::new(settings.max_entries))
        }
        CacheBackend::Disabled => {
            tracing::info!("cache disabled by configuration");
            disabled()
        }
        CacheBackend::Redis => connect_redis(settings).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(settings: &CacheSettings) -> SharedCache {
    match RedisCache::new(&settings.url).await {
        Ok(cache) => {
            tracing::info!(url = %settings.url, "connected to redis cache");
            Arc::new(cache)
        }
        Err(err) => {
            tracing::warn!(
                url = %settings.url,
                error = %err,
                "redis unavailable, continuing without cache"
            );
            disabled()
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_settings: &CacheSettings) -> SharedCache {
    tracing::warn!("redis cache requested but the `redis` feature is not compiled in; continuing without cache");
    disabled()
}
