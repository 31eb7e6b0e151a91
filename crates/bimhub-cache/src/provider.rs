//! Cache manager that dispatches to the configured store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use bimhub_core::config::cache::CacheConfig;
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_entity::download::DownloadParameters;

use crate::artifact::DownloadArtifact;
use crate::keys;
use crate::store::{ArtifactStore, DownloadCache};

/// Result cache keyed by download parameters.
///
/// When caching is disabled every lookup misses and every write is
/// dropped.
#[derive(Debug, Clone)]
pub struct DownloadCacheManager {
    inner: Option<Arc<dyn ArtifactStore>>,
}

impl DownloadCacheManager {
    /// Create a cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        if !config.enabled {
            info!("Download cache disabled");
            return Ok(Self::disabled());
        }
        let inner: Arc<dyn ArtifactStore> = match config.provider.as_str() {
            #[cfg(feature = "memory")]
            "memory" => {
                info!(
                    max_capacity = config.memory.max_capacity,
                    "Initializing in-memory download cache"
                );
                Arc::new(crate::memory::MemoryArtifactStore::new(&config.memory))
            }
            #[cfg(feature = "disk")]
            "disk" => {
                info!(directory = %config.disk.directory, "Initializing on-disk download cache");
                Arc::new(crate::disk::DiskArtifactStore::new(&config.disk).await?)
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, disk"
                )));
            }
        };
        Ok(Self { inner: Some(inner) })
    }

    /// Create a cache manager over an existing store.
    pub fn from_store(store: Arc<dyn ArtifactStore>) -> Self {
        Self { inner: Some(store) }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Whether results are stored at all.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}

#[async_trait]
impl DownloadCache for DownloadCacheManager {
    async fn contains(&self, params: &DownloadParameters) -> AppResult<bool> {
        match &self.inner {
            Some(store) => store.contains(&keys::download(params)).await,
            None => Ok(false),
        }
    }

    async fn get(&self, params: &DownloadParameters) -> AppResult<Option<DownloadArtifact>> {
        match &self.inner {
            Some(store) => store.get(&keys::download(params)).await,
            None => Ok(None),
        }
    }

    async fn put(&self, params: &DownloadParameters, artifact: DownloadArtifact) -> AppResult<()> {
        let Some(store) = &self.inner else {
            return Ok(());
        };
        let key = keys::download(params);
        debug!(key = %key, size = artifact.len(), "Caching download artifact");
        store.put(&key, artifact).await
    }

    async fn remove(&self, params: &DownloadParameters) -> AppResult<()> {
        match &self.inner {
            Some(store) => store.remove(&keys::download(params)).await,
            None => Ok(()),
        }
    }

    async fn len(&self) -> AppResult<u64> {
        match &self.inner {
            Some(store) => store.len().await,
            None => Ok(0),
        }
    }
}
