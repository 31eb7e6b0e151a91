//! Cache key construction.

use bimhub_entity::download::DownloadParameters;

/// Prefix applied to all BimHub cache keys.
const PREFIX: &str = "bimhub";

/// Cache key for the artifact of a download.
pub fn download(params: &DownloadParameters) -> String {
    format!("{PREFIX}:download:{}", params.fingerprint())
}

/// File stem used by the disk store for a key.
pub fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
