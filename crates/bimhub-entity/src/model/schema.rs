//! Entity type hierarchy used to resolve type names and subtypes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single entity type and its direct supertype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    /// Canonical type name.
    pub name: String,
    /// Canonical name of the direct supertype.
    pub supertype: Option<String>,
}

/// A schema: entity definitions addressed case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Schema name, e.g. `"IFC2X3"`.
    pub name: String,
    entities: HashMap<String, EntityDefinition>,
}

impl SchemaDefinition {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: HashMap::new(),
        }
    }

    /// Add an entity with an optional direct supertype.
    pub fn with_entity(mut self, name: &str, supertype: Option<&str>) -> Self {
        self.entities.insert(
            name.to_ascii_lowercase(),
            EntityDefinition {
                name: name.to_string(),
                supertype: supertype.map(str::to_string),
            },
        );
        self
    }

    /// Look up an entity by name, ignoring case.
    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        self.entities.get(&name.to_ascii_lowercase())
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the schema defines no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether `name` equals `ancestor` or has it somewhere in its
    /// supertype chain.
    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        let mut current = self.entity(name);
        // The chain can never be longer than the schema; a longer walk means a cycle.
        for _ in 0..=self.entities.len() {
            match current {
                Some(entity) if entity.name.eq_ignore_ascii_case(ancestor) => return true,
                Some(entity) => {
                    current = entity.supertype.as_deref().and_then(|s| self.entity(s));
                }
                None => return false,
            }
        }
        false
    }

    /// All transitive subtypes of `name`, excluding `name` itself, sorted.
    pub fn subtypes_of(&self, name: &str) -> Vec<String> {
        let Some(root) = self.entity(name) else {
            return Vec::new();
        };
        let mut subtypes: Vec<String> = self
            .entities
            .values()
            .filter(|e| !e.name.eq_ignore_ascii_case(&root.name))
            .filter(|e| self.is_subtype_of(&e.name, &root.name))
            .map(|e| e.name.clone())
            .collect();
        subtypes.sort();
        subtypes
    }

    /// A subset of the IFC2x3 entity hierarchy covering the common
    /// building elements.
    pub fn ifc2x3_core() -> Self {
        Self::new("IFC2X3")
            .with_entity("IfcRoot", None)
            .with_entity("IfcObjectDefinition", Some("IfcRoot"))
            .with_entity("IfcObject", Some("IfcObjectDefinition"))
            .with_entity("IfcProduct", Some("IfcObject"))
            .with_entity("IfcElement", Some("IfcProduct"))
            .with_entity("IfcBuildingElement", Some("IfcElement"))
            .with_entity("IfcWall", Some("IfcBuildingElement"))
            .with_entity("IfcWallStandardCase", Some("IfcWall"))
            .with_entity("IfcSlab", Some("IfcBuildingElement"))
            .with_entity("IfcBeam", Some("IfcBuildingElement"))
            .with_entity("IfcColumn", Some("IfcBuildingElement"))
            .with_entity("IfcDoor", Some("IfcBuildingElement"))
            .with_entity("IfcWindow", Some("IfcBuildingElement"))
            .with_entity("IfcRoof", Some("IfcBuildingElement"))
            .with_entity("IfcStair", Some("IfcBuildingElement"))
            .with_entity("IfcSpatialStructureElement", Some("IfcProduct"))
            .with_entity("IfcSite", Some("IfcSpatialStructureElement"))
            .with_entity("IfcBuilding", Some("IfcSpatialStructureElement"))
            .with_entity("IfcBuildingStorey", Some("IfcSpatialStructureElement"))
            .with_entity("IfcSpace", Some("IfcSpatialStructureElement"))
            .with_entity("IfcContext", Some("IfcObject"))
            .with_entity("IfcProject", Some("IfcObjectDefinition"))
            .with_entity("IfcRelationship", Some("IfcRoot"))
            .with_entity("IfcRelContainedInSpatialStructure", Some("IfcRelationship"))
            .with_entity("IfcRelAggregates", Some("IfcRelationship"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walls() -> SchemaDefinition {
        SchemaDefinition::new("TEST")
            .with_entity("Element", None)
            .with_entity("Wall", Some("Element"))
            .with_entity("WallStandardCase", Some("Wall"))
            .with_entity("Door", Some("Element"))
    }

    #[test]
    fn test_lookup_ignores_case() {
        let schema = walls();
        assert_eq!(schema.entity("wall").map(|e| e.name.as_str()), Some("Wall"));
        assert!(schema.entity("Window").is_none());
    }

    #[test]
    fn test_subtypes_are_transitive() {
        let schema = walls();
        assert_eq!(
            schema.subtypes_of("Element"),
            vec!["Door".to_string(), "Wall".to_string(), "WallStandardCase".to_string()]
        );
        assert_eq!(schema.subtypes_of("Wall"), vec!["WallStandardCase".to_string()]);
        assert!(schema.subtypes_of("Door").is_empty());
        assert!(schema.subtypes_of("Unknown").is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let schema = SchemaDefinition::new("BROKEN")
            .with_entity("A", Some("B"))
            .with_entity("B", Some("A"));
        assert!(!schema.is_subtype_of("A", "C"));
    }

    #[test]
    fn test_ifc_core_hierarchy() {
        let schema = SchemaDefinition::ifc2x3_core();
        assert!(schema.is_subtype_of("IfcWallStandardCase", "IfcBuildingElement"));
        assert!(schema.subtypes_of("IfcWall").contains(&"IfcWallStandardCase".to_string()));
    }
}
