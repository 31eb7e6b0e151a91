//! On-disk artifact store.
//!
//! Each artifact is stored as `<stem>.bin` with a `<stem>.json` metadata
//! file. Both are written to a temporary name and renamed into place, data
//! first, so a reader that finds the metadata always finds complete data.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use bimhub_core::config::cache::DiskCacheConfig;
use bimhub_core::error::{AppError, ErrorKind};
use bimhub_core::result::AppResult;

use crate::artifact::{ArtifactMeta, DownloadArtifact};
use crate::keys;
use crate::store::ArtifactStore;

const DATA_EXT: &str = "bin";
const META_EXT: &str = "json";

/// Artifact store rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskArtifactStore {
    root: PathBuf,
}

impl DiskArtifactStore {
    /// Create the store, creating its directory if needed.
    pub async fn new(config: &DiskCacheConfig) -> AppResult<Self> {
        Self::at(&config.directory).await
    }

    /// Create a store rooted at `root`.
    pub async fn at(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to create cache directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    fn path(&self, key: &str, ext: &str) -> PathBuf {
        self.root.join(format!("{}.{ext}", keys::file_stem(key)))
    }

    async fn write_atomic(&self, target: &Path, contents: &[u8]) -> AppResult<()> {
        let tmp = target.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_meta(&self, key: &str) -> AppResult<Option<ArtifactMeta>> {
        match fs::read(self.path(key, META_EXT)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remove_if_exists(path: &Path) -> AppResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    async fn get(&self, key: &str) -> AppResult<Option<DownloadArtifact>> {
        let meta = match self.read_meta(key).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache metadata");
                self.remove(key).await?;
                return Ok(None);
            }
        };
        let data = match fs::read(self.path(key, DATA_EXT)).await {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                warn!(key, "Cache metadata without data, discarding");
                self.remove(key).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if data.len() as u64 != meta.size {
            warn!(key, expected = meta.size, actual = data.len(), "Truncated cache entry");
            self.remove(key).await?;
            return Ok(None);
        }
        Ok(Some(DownloadArtifact::from_parts(meta, Bytes::from(data))))
    }

    async fn put(&self, key: &str, artifact: DownloadArtifact) -> AppResult<()> {
        let meta = serde_json::to_vec_pretty(&artifact.meta())?;
        self.write_atomic(&self.path(key, DATA_EXT), &artifact.data)
            .await?;
        self.write_atomic(&self.path(key, META_EXT), &meta).await?;
        debug!(key, size = artifact.len(), "Stored artifact on disk");
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        // Metadata goes first so the entry disappears before its data.
        remove_if_exists(&self.path(key, META_EXT)).await?;
        remove_if_exists(&self.path(key, DATA_EXT)).await
    }

    async fn contains(&self, key: &str) -> AppResult<bool> {
        Ok(fs::try_exists(self.path(key, META_EXT)).await?)
    }

    async fn len(&self) -> AppResult<u64> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == META_EXT) {
                count += 1;
            }
        }
        Ok(count)
    }
}
