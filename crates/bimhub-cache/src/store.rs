//! Cache traits.

use async_trait::async_trait;

use bimhub_core::result::AppResult;
use bimhub_entity::download::DownloadParameters;

use crate::artifact::DownloadArtifact;

/// A key/value store for artifacts, addressed by cache key strings.
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch an artifact.
    async fn get(&self, key: &str) -> AppResult<Option<DownloadArtifact>>;

    /// Store an artifact, replacing any previous one.
    async fn put(&self, key: &str, artifact: DownloadArtifact) -> AppResult<()>;

    /// Drop an artifact. Missing keys are ignored.
    async fn remove(&self, key: &str) -> AppResult<()>;

    /// Whether an artifact is stored.
    async fn contains(&self, key: &str) -> AppResult<bool>;

    /// Number of stored artifacts.
    async fn len(&self) -> AppResult<u64>;
}

/// The result cache consulted and filled by download actions.
#[async_trait]
pub trait DownloadCache: Send + Sync + std::fmt::Debug + 'static {
    /// Whether a result for these parameters is cached.
    async fn contains(&self, params: &DownloadParameters) -> AppResult<bool>;

    /// The cached result for these parameters.
    async fn get(&self, params: &DownloadParameters) -> AppResult<Option<DownloadArtifact>>;

    /// Cache a result for these parameters.
    async fn put(&self, params: &DownloadParameters, artifact: DownloadArtifact) -> AppResult<()>;

    /// Drop the result for these parameters.
    async fn remove(&self, params: &DownloadParameters) -> AppResult<()>;

    /// Number of cached results.
    async fn len(&self) -> AppResult<u64>;
}
