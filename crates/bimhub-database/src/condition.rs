//! Object selection conditions.

use std::collections::BTreeSet;

use bimhub_core::types::id::{Oid, Uoid};
use bimhub_entity::model::IfcObject;

/// A predicate over model objects, evaluated within one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Every object.
    All,
    /// Objects whose oid is in the set.
    OidIn(BTreeSet<Oid>),
    /// Objects whose GUID is in the set.
    GuidIn(BTreeSet<String>),
    /// Objects whose type name is in the set (stored lowercase).
    TypeIn(BTreeSet<String>),
    /// Objects not owned by the given user.
    OwnerIsNot(Uoid),
    /// Conjunction; an empty list matches everything.
    And(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// Build a type condition, normalizing names for case-insensitive matching.
    pub fn type_in<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::TypeIn(
            names
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Combine with another condition.
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Self::All, c) | (c, Self::All) => c,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), c) => {
                left.push(c);
                Self::And(left)
            }
            (c, other) => Self::And(vec![c, other]),
        }
    }

    /// Evaluate the condition against an object.
    pub fn matches(&self, object: &IfcObject) -> bool {
        match self {
            Self::All => true,
            Self::OidIn(oids) => oids.contains(&object.oid),
            Self::GuidIn(guids) => object
                .guid
                .as_ref()
                .is_some_and(|guid| guids.contains(guid)),
            Self::TypeIn(names) => names.contains(&object.type_name.to_ascii_lowercase()),
            Self::OwnerIsNot(uoid) => object.owner != *uoid,
            Self::And(conditions) => conditions.iter().all(|c| c.matches(object)),
            Self::Not(inner) => !inner.matches(object),
        }
    }

    /// Whether the condition can never match, letting callers skip the query.
    pub fn is_empty_selection(&self) -> bool {
        match self {
            Self::OidIn(set) => set.is_empty(),
            Self::GuidIn(set) => set.is_empty(),
            Self::TypeIn(set) => set.is_empty(),
            Self::And(conditions) => conditions.iter().any(Condition::is_empty_selection),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(oid: i64, owner: i64) -> IfcObject {
        IfcObject::new(Oid::new(oid), "IfcWall", Uoid::new(owner)).with_guid(format!("g{oid}"))
    }

    #[test]
    fn test_oid_and_guid() {
        let object = wall(101, 1);
        assert!(Condition::OidIn([Oid::new(101)].into()).matches(&object));
        assert!(!Condition::OidIn([Oid::new(102)].into()).matches(&object));
        assert!(Condition::GuidIn(["g101".to_string()].into()).matches(&object));
        assert!(!Condition::GuidIn(BTreeSet::new()).matches(&object));
    }

    #[test]
    fn test_type_in_ignores_case() {
        assert!(Condition::type_in(["IFCWALL"]).matches(&wall(1, 1)));
        assert!(!Condition::type_in(["IfcDoor"]).matches(&wall(1, 1)));
    }

    #[test]
    fn test_and_flattens() {
        let condition = Condition::All
            .and(Condition::OwnerIsNot(Uoid::new(2)))
            .and(Condition::type_in(["IfcWall"]));
        assert!(matches!(&condition, Condition::And(items) if items.len() == 2));
        assert!(condition.matches(&wall(1, 1)));
        assert!(!condition.matches(&wall(1, 2)));
    }

    #[test]
    fn test_not() {
        let condition = Condition::Not(Box::new(Condition::OidIn([Oid::new(1)].into())));
        assert!(!condition.matches(&wall(1, 1)));
        assert!(condition.matches(&wall(2, 1)));
    }

    #[test]
    fn test_empty_selection() {
        assert!(Condition::OidIn(BTreeSet::new()).is_empty_selection());
        assert!(
            Condition::OwnerIsNot(Uoid::new(1))
                .and(Condition::TypeIn(BTreeSet::new()))
                .is_empty_selection()
        );
        assert!(!Condition::All.is_empty_selection());
    }
}
