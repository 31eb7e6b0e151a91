//! Serializer configuration records.

use serde::{Deserialize, Serialize};

/// A configured object id mapping, referencing a plugin by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIdmRecord {
    /// Configuration name.
    pub name: String,
    /// Name of the plugin implementing the mapping.
    pub plugin: String,
}

/// A configured serializer, looked up by its exact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerRecord {
    /// Serializer name as requested by clients.
    pub name: String,
    /// Name of the plugin producing the bytes.
    pub plugin: String,
    /// Whether the serializer may be used.
    pub enabled: bool,
    /// Object id mapping applied while building the model.
    pub object_idm: Option<ObjectIdmRecord>,
}
