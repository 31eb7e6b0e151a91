//! Model object records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bimhub_core::types::id::{Oid, Uoid};

/// A single versioned model object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfcObject {
    /// Internal identifier.
    pub oid: Oid,
    /// Globally unique identifier, stable across revisions.
    pub guid: Option<String>,
    /// Entity type name as defined in the schema.
    pub type_name: String,
    /// Optional object name.
    pub name: Option<String>,
    /// User that created or last changed the object.
    pub owner: Uoid,
    /// Remaining typed fields, keyed by field name.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl IfcObject {
    /// Create an object with no name, GUID or attributes.
    pub fn new(oid: Oid, type_name: impl Into<String>, owner: Uoid) -> Self {
        Self {
            oid,
            guid: None,
            type_name: type_name.into(),
            name: None,
            owner,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the GUID.
    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an attribute value.
    pub fn with_attribute(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(field.into(), value);
        self
    }

    /// Drop every attribute for which `ignore` returns `true`.
    pub fn remove_fields<F>(&mut self, mut ignore: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        let type_name = self.type_name.clone();
        self.attributes.retain(|field, _| !ignore(&type_name, field));
    }

    /// Whether the object's type name equals `type_name`, ignoring case.
    pub fn is_type(&self, type_name: &str) -> bool {
        self.type_name.eq_ignore_ascii_case(type_name)
    }
}
