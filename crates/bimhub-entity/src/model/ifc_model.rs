//! The in-memory model returned by every download action.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use bimhub_core::types::id::Oid;

use super::object::IfcObject;

/// How an object differs between two compared revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only in the newer revision.
    Added,
    /// Present only in the older revision.
    Deleted,
    /// Present in both with different content.
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Modified => "modified",
        };
        write!(f, "{s}")
    }
}

/// A set of model objects keyed by oid, with optional change annotations.
///
/// Objects deleted in a comparison come from the older revision, whose
/// oids may be reused by the newer one, so they are kept apart from the
/// oid-keyed objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IfcModel {
    objects: BTreeMap<Oid, IfcObject>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    changes: BTreeMap<Oid, ChangeKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deleted: Vec<IfcObject>,
}

impl IfcModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object. Returns `false` if an object with the same oid was
    /// already present, in which case the model is left unchanged.
    pub fn add(&mut self, object: IfcObject) -> bool {
        if self.objects.contains_key(&object.oid) {
            return false;
        }
        self.objects.insert(object.oid, object);
        true
    }

    /// Add an object together with its change annotation. Deleted
    /// objects are always recorded, even when their oid is taken.
    pub fn add_change(&mut self, object: IfcObject, kind: ChangeKind) -> bool {
        if kind == ChangeKind::Deleted {
            self.deleted.push(object);
            return true;
        }
        let oid = object.oid;
        if self.add(object) {
            self.changes.insert(oid, kind);
            true
        } else {
            false
        }
    }

    /// Look up an object by oid.
    pub fn get(&self, oid: Oid) -> Option<&IfcObject> {
        self.objects.get(&oid)
    }

    /// Look up an object by GUID.
    pub fn get_by_guid(&self, guid: &str) -> Option<&IfcObject> {
        self.objects
            .values()
            .find(|object| object.guid.as_deref() == Some(guid))
    }

    /// Whether an object with this oid is present.
    pub fn contains(&self, oid: Oid) -> bool {
        self.objects.contains_key(&oid)
    }

    /// Number of objects, deleted ones included.
    pub fn len(&self) -> usize {
        self.objects.len() + self.deleted.len()
    }

    /// Whether the model holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.deleted.is_empty()
    }

    /// Iterate over present objects in oid order.
    pub fn objects(&self) -> impl Iterator<Item = &IfcObject> {
        self.objects.values()
    }

    /// Objects deleted in a comparison, as they were in the older revision.
    pub fn deleted(&self) -> impl Iterator<Item = &IfcObject> {
        self.deleted.iter()
    }

    /// Every object with its change annotation, ordered by oid. A deleted
    /// object sorts before a present one sharing its oid.
    pub fn entries(&self) -> Vec<(&IfcObject, Option<ChangeKind>)> {
        let mut entries: Vec<_> = self
            .deleted
            .iter()
            .map(|object| (object, Some(ChangeKind::Deleted)))
            .chain(self.objects.values().map(|object| (object, self.change_of(object.oid))))
            .collect();
        entries.sort_by_key(|(object, _)| object.oid);
        entries
    }

    /// All oids in ascending order.
    pub fn oids(&self) -> Vec<Oid> {
        self.objects.keys().copied().collect()
    }

    /// Objects whose type name matches, ignoring case.
    pub fn objects_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a IfcObject> {
        self.objects.values().filter(move |o| o.is_type(type_name))
    }

    /// Change annotation of an object, if the model is a comparison.
    pub fn change_of(&self, oid: Oid) -> Option<ChangeKind> {
        self.changes.get(&oid).copied()
    }

    /// Number of objects annotated with `kind`.
    pub fn count_changes(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::Deleted => self.deleted.len(),
            _ => self.changes.values().filter(|k| **k == kind).count(),
        }
    }

    /// Move every object of `other` into this model, keeping existing
    /// objects on oid collisions. Deleted objects are always moved.
    /// Returns the number of objects added.
    pub fn merge(&mut self, other: IfcModel) -> usize {
        let IfcModel {
            objects,
            changes,
            deleted,
        } = other;
        let mut added = deleted.len();
        self.deleted.extend(deleted);
        for (oid, object) in objects {
            if self.add(object) {
                if let Some(kind) = changes.get(&oid) {
                    self.changes.insert(oid, *kind);
                }
                added += 1;
            }
        }
        added
    }
}
