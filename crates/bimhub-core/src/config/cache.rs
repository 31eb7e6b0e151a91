//! Download result cache configuration.

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether completed downloads are cached at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache provider type: `"memory"` or `"disk"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
    /// On-disk cache configuration.
    #[serde(default)]
    pub disk: DiskCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            memory: MemoryCacheConfig::default(),
            disk: DiskCacheConfig::default(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of artifacts kept in memory.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// TTL for in-memory artifacts in seconds.
    #[serde(default = "default_memory_ttl")]
    pub time_to_live_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            time_to_live_seconds: default_memory_ttl(),
        }
    }
}

/// On-disk cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskCacheConfig {
    /// Directory holding cached artifacts.
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_max_capacity() -> u64 {
    256
}

fn default_memory_ttl() -> u64 {
    3600
}

fn default_directory() -> String {
    "data/cache/downloads".to_string()
}
