//! Options for revision comparison downloads.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ChangeKind;

/// Attribute used to pair objects across the compared revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareIdentifier {
    /// Pair objects by GUID.
    GuidId,
    /// Pair objects by name.
    NameId,
}

impl CompareIdentifier {
    /// Return the identifier as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GuidId => "GUID_ID",
            Self::NameId => "NAME_ID",
        }
    }
}

impl fmt::Display for CompareIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which differences a comparison reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareType {
    /// Additions, deletions and modifications.
    All,
    /// Additions only.
    Add,
    /// Modifications only.
    Modify,
    /// Deletions only.
    Delete,
}

impl CompareType {
    /// Return the compare type as an uppercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
        }
    }

    /// Whether differences of `kind` are part of the result.
    pub fn includes(&self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (Self::All, _)
                | (Self::Add, ChangeKind::Added)
                | (Self::Modify, ChangeKind::Modified)
                | (Self::Delete, ChangeKind::Deleted)
        )
    }
}

impl fmt::Display for CompareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        assert!(CompareType::All.includes(ChangeKind::Deleted));
        assert!(CompareType::Add.includes(ChangeKind::Added));
        assert!(!CompareType::Add.includes(ChangeKind::Modified));
        assert!(CompareType::Delete.includes(ChangeKind::Deleted));
    }
}
