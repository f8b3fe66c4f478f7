use std::time::Duration;

use async_trait::async_trait;

use crate::{Cache, Result};

/// Cache that stores nothing; every read is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl Cache for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
