use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which cache store backs the listing cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "CacheSettings::default_url")]
    pub url: String,
    #[serde(default = "CacheSettings::default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "CacheSettings::default_max_entries")]
    pub max_entries: usize,
    /// Listing pages `1..=invalidate_max_pages` are purged on every write.
    #[serde(default = "CacheSettings::default_invalidate_max_pages")]
    pub invalidate_max_pages: u32,
    #[serde(default = "CacheSettings::default_invalidate_page_sizes")]
    pub invalidate_page_sizes: Vec<u32>,
}

impl CacheSettings {
    fn default_url() -> String {
        "redis://127.0.0.1:6379".to_string()
    }

    fn default_ttl_secs() -> u64 {
        300
    }

    fn default_max_entries() -> usize {
        1024
    }

    fn default_invalidate_max_pages() -> u32 {
        9
    }

    fn default_invalidate_page_sizes() -> Vec<u32> {
        vec![10, 25, 50, 100]
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            url: Self::default_url(),
            ttl_secs: Self::default_ttl_secs(),
            max_entries: Self::default_max_entries(),
            invalidate_max_pages: Self::default_invalidate_max_pages(),
            invalidate_page_sizes: Self::default_invalidate_page_sizes(),
        }
    }
}
