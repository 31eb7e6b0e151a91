//! Serialized download results.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The bytes produced by a serializer for one download, plus what a
/// client needs to save them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    /// Name of the serializer plugin that produced the data.
    pub serializer: String,
    /// MIME type of `data`.
    pub content_type: String,
    /// File extension without a leading dot.
    pub extension: String,
    /// Number of objects written.
    pub object_count: usize,
    /// Serialized model.
    pub data: Bytes,
}

impl DownloadArtifact {
    /// Size of the serialized data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the serialized data is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Metadata without the payload.
    pub fn meta(&self) -> ArtifactMeta {
        ArtifactMeta {
            serializer: self.serializer.clone(),
            content_type: self.content_type.clone(),
            extension: self.extension.clone(),
            object_count: self.object_count,
            size: self.data.len() as u64,
        }
    }

    /// Reassemble an artifact from metadata and payload.
    pub fn from_parts(meta: ArtifactMeta, data: Bytes) -> Self {
        Self {
            serializer: meta.serializer,
            content_type: meta.content_type,
            extension: meta.extension,
            object_count: meta.object_count,
            data,
        }
    }
}

/// Artifact metadata persisted next to the payload by the disk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Serializer plugin name.
    pub serializer: String,
    /// MIME type.
    pub content_type: String,
    /// File extension.
    pub extension: String,
    /// Number of objects written.
    pub object_count: usize,
    /// Payload size, used to detect truncated files.
    pub size: u64,
}
