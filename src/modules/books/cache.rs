//! Cache-aside wrapper for paginated book listings.
//!
//! Entries are keyed by `(page, per_page)` and hold the JSON page structure.
//! Writes purge a fixed grid of keys; pages outside the grid stay stale until
//! their TTL runs out. Every cache failure is logged and absorbed.

use std::future::Future;
use std::time::Duration;

use folio_cache::{CacheSettings, SharedCache};

use super::models::BookPage;

pub fn listing_key(page: u32, per_page: u32) -> String {
    format!("books:page:{page}:per_page:{per_page}")
}

#[derive(Clone)]
pub struct BookListingCache {
    cache: SharedCache,
    ttl: Duration,
    max_pages: u32,
    page_sizes: Vec<u32>,
}

impl BookListingCache {
    pub fn new(cache: SharedCache, settings: &CacheSettings) -> Self {
        Self {
            cache,
            ttl: settings.ttl(),
            max_pages: settings.invalidate_max_pages,
            page_sizes: settings.invalidate_page_sizes.clone(),
        }
    }

    /// Every key purged by [`invalidate`](Self::invalidate).
    pub fn invalidation_keys(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.max_pages).flat_map(move |page| {
            self.page_sizes
                .iter()
                .map(move |&per_page| listing_key(page, per_page))
        })
    }

    /// Return the cached page, or run `load` and cache what it returns.
    ///
    /// Load errors are passed through and nothing is cached for them.
    pub async fn get_or_populate<F, Fut, E>(
        &self,
        page: u32,
        per_page: u32,
        load: F,
    ) -> Result<BookPage, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BookPage, E>>,
    {
        let key = listing_key(page, per_page);

        if let Some(cached) = self.lookup(&key).await {
            tracing::debug!(cache_key = %key, "book listing cache hit");
            return Ok(cached);
        }
        tracing::debug!(cache_key = %key, "book listing cache miss");

        let fresh = load().await?;
        self.store(&key, &fresh).await;
        Ok(fresh)
    }

    async fn lookup(&self, key: &str) -> Option<BookPage> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "cache read failed, falling back to store");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(page) => Some(page),
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn store(&self, key: &str, page: &BookPage) {
        let bytes = match serde_json::to_vec(page) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(cache_key = %key, error = %err, "failed to encode book listing");
                return;
            }
        };

        if let Err(err) = self.cache.set(key, &bytes, Some(self.ttl)).await {
            tracing::warn!(cache_key = %key, error = %err, "cache write failed");
        }
    }

    /// Delete every key in the invalidation grid.
    ///
    /// Stops at the first failure; the remaining keys expire by TTL.
    pub async fn invalidate(&self) {
        let mut purged = 0usize;
        for key in self.invalidation_keys() {
            if let Err(err) = self.cache.delete(&key).await {
                tracing::warn!(cache_key = %key, error = %err, "cache invalidation skipped");
                return;
            }
            purged += 1;
        }
        tracing::debug!(purged, "book listing cache invalidated");
    }
}
