//! The download request fingerprint.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Oid, Roid, Uoid};

use super::compare::{CompareIdentifier, CompareType};

/// The six supported download modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadType {
    /// All objects of one revision.
    #[serde(rename = "DOWNLOAD_REVISION")]
    Revision,
    /// Objects selected by oid across revisions.
    #[serde(rename = "DOWNLOAD_BY_OIDS")]
    ByOids,
    /// Objects selected by GUID across revisions.
    #[serde(rename = "DOWNLOAD_BY_GUIDS")]
    ByGuids,
    /// Objects of the given types across revisions.
    #[serde(rename = "DOWNLOAD_OF_TYPE")]
    OfType,
    /// Latest revisions of the projects owning the given revisions.
    #[serde(rename = "DOWNLOAD_PROJECTS")]
    Projects,
    /// Differences between two revisions.
    #[serde(rename = "DOWNLOAD_COMPARE")]
    Compare,
}

impl DownloadType {
    /// Return the download type as its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revision => "DOWNLOAD_REVISION",
            Self::ByOids => "DOWNLOAD_BY_OIDS",
            Self::ByGuids => "DOWNLOAD_BY_GUIDS",
            Self::OfType => "DOWNLOAD_OF_TYPE",
            Self::Projects => "DOWNLOAD_PROJECTS",
            Self::Compare => "DOWNLOAD_COMPARE",
        }
    }
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable description of what to export and how.
///
/// Equality and hashing are structural: two instances with equal fields
/// identify the same export and share one cache entry. Selector sets are
/// kept ordered so that the same selection always yields the same
/// [`fingerprint`](Self::fingerprint); revision order is significant
/// because comparisons read it as (older, newer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadParameters {
    download_type: DownloadType,
    roids: Vec<Roid>,
    #[serde(default)]
    oids: BTreeSet<Oid>,
    #[serde(default)]
    guids: BTreeSet<String>,
    #[serde(default)]
    class_names: BTreeSet<String>,
    #[serde(default)]
    include_all_subtypes: bool,
    #[serde(default)]
    compare_identifier: Option<CompareIdentifier>,
    #[serde(default)]
    compare_type: Option<CompareType>,
    #[serde(default)]
    serializer_name: Option<String>,
    #[serde(default)]
    ignore_uoid: Option<Uoid>,
}

impl DownloadParameters {
    fn base(download_type: DownloadType, roids: Vec<Roid>) -> Self {
        Self {
            download_type,
            roids,
            oids: BTreeSet::new(),
            guids: BTreeSet::new(),
            class_names: BTreeSet::new(),
            include_all_subtypes: false,
            compare_identifier: None,
            compare_type: None,
            serializer_name: None,
            ignore_uoid: None,
        }
    }

    /// Download a complete revision.
    pub fn revision(roid: Roid) -> Self {
        Self::base(DownloadType::Revision, vec![roid])
    }

    /// Download objects by oid from the given revisions.
    pub fn by_oids(roids: Vec<Roid>, oids: impl IntoIterator<Item = Oid>) -> Self {
        let mut params = Self::base(DownloadType::ByOids, roids);
        params.oids = oids.into_iter().collect();
        params
    }

    /// Download objects by GUID from the given revisions.
    pub fn by_guids<S: Into<String>>(roids: Vec<Roid>, guids: impl IntoIterator<Item = S>) -> Self {
        let mut params = Self::base(DownloadType::ByGuids, roids);
        params.guids = guids.into_iter().map(Into::into).collect();
        params
    }

    /// Download all objects of the given types from the given revisions.
    pub fn of_type<S: Into<String>>(
        roids: Vec<Roid>,
        class_names: impl IntoIterator<Item = S>,
        include_all_subtypes: bool,
    ) -> Self {
        let mut params = Self::base(DownloadType::OfType, roids);
        params.class_names = class_names.into_iter().map(Into::into).collect();
        params.include_all_subtypes = include_all_subtypes;
        params
    }

    /// Download the latest revision of every project owning one of `roids`.
    pub fn projects(roids: Vec<Roid>) -> Self {
        Self::base(DownloadType::Projects, roids)
    }

    /// Compare `older` against `newer`.
    pub fn compare(
        older: Roid,
        newer: Roid,
        identifier: CompareIdentifier,
        compare_type: CompareType,
    ) -> Self {
        let mut params = Self::base(DownloadType::Compare, vec![older, newer]);
        params.compare_identifier = Some(identifier);
        params.compare_type = Some(compare_type);
        params
    }

    /// Select the serializer producing the output bytes.
    pub fn with_serializer(mut self, name: impl Into<String>) -> Self {
        self.serializer_name = Some(name.into());
        self
    }

    /// Fill in `name` when no serializer was chosen, so that an explicit
    /// default and an omitted one describe the same export.
    pub fn with_default_serializer(mut self, name: &str) -> Self {
        if self.serializer_name.is_none() {
            self.serializer_name = Some(name.to_string());
        }
        self
    }

    /// Exclude objects owned by the given user.
    pub fn with_ignore_uoid(mut self, uoid: Uoid) -> Self {
        self.ignore_uoid = Some(uoid);
        self
    }

    /// Download mode.
    pub fn download_type(&self) -> DownloadType {
        self.download_type
    }

    /// Revision ids, in request order.
    pub fn roids(&self) -> &[Roid] {
        &self.roids
    }

    /// First revision id (the single revision of a revision download).
    pub fn roid(&self) -> Option<Roid> {
        self.roids.first().copied()
    }

    /// Selected oids.
    pub fn oids(&self) -> &BTreeSet<Oid> {
        &self.oids
    }

    /// Selected GUIDs.
    pub fn guids(&self) -> &BTreeSet<String> {
        &self.guids
    }

    /// Selected type names.
    pub fn class_names(&self) -> &BTreeSet<String> {
        &self.class_names
    }

    /// Whether subtypes of the selected types are included.
    pub fn include_all_subtypes(&self) -> bool {
        self.include_all_subtypes
    }

    /// Comparison identifier.
    pub fn compare_identifier(&self) -> Option<CompareIdentifier> {
        self.compare_identifier
    }

    /// Comparison type.
    pub fn compare_type(&self) -> Option<CompareType> {
        self.compare_type
    }

    /// Requested serializer name.
    pub fn serializer_name(&self) -> Option<&str> {
        self.serializer_name.as_deref()
    }

    /// User whose objects are excluded.
    pub fn ignore_uoid(&self) -> Option<Uoid> {
        self.ignore_uoid
    }

    /// Check that the selector fields required by the download mode are present.
    ///
    /// Empty oid, GUID and type sets are valid and produce empty models.
    pub fn validate(&self) -> AppResult<()> {
        match self.download_type {
            DownloadType::Revision => {
                if self.roids.len() != 1 {
                    return Err(AppError::validation(format!(
                        "{} requires exactly one revision, got {}",
                        self.download_type,
                        self.roids.len()
                    )));
                }
            }
            DownloadType::Compare => {
                if self.roids.len() != 2 {
                    return Err(AppError::validation(format!(
                        "{} requires exactly two revisions, got {}",
                        self.download_type,
                        self.roids.len()
                    )));
                }
                if self.compare_identifier.is_none() || self.compare_type.is_none() {
                    return Err(AppError::validation(
                        "DOWNLOAD_COMPARE requires a compare identifier and a compare type",
                    ));
                }
            }
            DownloadType::ByOids
            | DownloadType::ByGuids
            | DownloadType::OfType
            | DownloadType::Projects => {
                if self.roids.is_empty() {
                    return Err(AppError::validation(format!(
                        "{} requires at least one revision",
                        self.download_type
                    )));
                }
            }
        }
        if let Some(name) = &self.serializer_name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Serializer name must not be blank"));
            }
        }
        Ok(())
    }

    /// Stable hex digest identifying this export, used as cache key.
    pub fn fingerprint(&self) -> String {
        fn put_str(hasher: &mut Sha256, tag: &[u8], value: &str) {
            hasher.update(tag);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value.as_bytes());
        }

        let mut hasher = Sha256::new();
        put_str(&mut hasher, b"t", self.download_type.as_str());
        for roid in &self.roids {
            hasher.update(b"r");
            hasher.update(roid.value().to_be_bytes());
        }
        for oid in &self.oids {
            hasher.update(b"o");
            hasher.update(oid.value().to_be_bytes());
        }
        for guid in &self.guids {
            put_str(&mut hasher, b"g", guid);
        }
        // Type names match case-insensitively.
        let class_names: BTreeSet<String> = self
            .class_names
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        for class_name in &class_names {
            put_str(&mut hasher, b"c", class_name);
        }
        hasher.update([b's', self.include_all_subtypes as u8]);
        if let Some(identifier) = self.compare_identifier {
            put_str(&mut hasher, b"i", identifier.as_str());
        }
        if let Some(compare_type) = self.compare_type {
            put_str(&mut hasher, b"k", compare_type.as_str());
        }
        if let Some(serializer) = &self.serializer_name {
            put_str(&mut hasher, b"z", serializer);
        }
        if let Some(uoid) = self.ignore_uoid {
            hasher.update(b"u");
            hasher.update(uoid.value().to_be_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Suggested file name for the exported artifact.
    pub fn file_name(&self, extension: &str) -> String {
        let roids: Vec<String> = self.roids.iter().map(|r| r.to_string()).collect();
        let stem = match self.download_type {
            DownloadType::Revision => "revision",
            DownloadType::ByOids => "objects",
            DownloadType::ByGuids => "guids",
            DownloadType::OfType => "types",
            DownloadType::Projects => "projects",
            DownloadType::Compare => "compare",
        };
        format!("{stem}-{}.{extension}", roids.join("-"))
    }
}
