//! In-memory artifact store using moka.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use bimhub_core::config::cache::MemoryCacheConfig;
use bimhub_core::result::AppResult;

use crate::artifact::DownloadArtifact;
use crate::store::ArtifactStore;

/// Bounded in-memory store. Entries expire after the configured TTL.
#[derive(Debug, Clone)]
pub struct MemoryArtifactStore {
    cache: Cache<String, DownloadArtifact>,
}

impl MemoryArtifactStore {
    /// Create a store from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .build();
        Self { cache }
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, key: &str) -> AppResult<Option<DownloadArtifact>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: &str, artifact: DownloadArtifact) -> AppResult<()> {
        self.cache.insert(key.to_string(), artifact).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn contains(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.contains_key(key))
    }

    async fn len(&self) -> AppResult<u64> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count())
    }
}
