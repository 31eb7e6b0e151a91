//! Plugin traits.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use bimhub_core::result::AppResult;
use bimhub_entity::model::{IfcModel, SchemaDefinition};
use bimhub_entity::store::AccessMethod;

/// The two plugin families a download uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Object id mapping.
    ObjectIdm,
    /// Model serializer.
    Serializer,
}

/// Metadata about a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique name within its kind; this is what records refer to.
    pub name: String,
    /// Plugin family.
    pub kind: PluginKind,
    /// Version string.
    pub version: String,
    /// Human-readable description.
    pub description: String,
}

/// Decides which objects and fields make it into an export.
pub trait ObjectIdm: Send + Sync + std::fmt::Debug {
    /// Whether `field` of objects of `type_name` is left out.
    fn should_ignore_field(&self, type_name: &str, field: &str) -> bool;

    /// Whether objects of `type_name` are exported at all.
    fn should_include_object(&self, type_name: &str) -> bool;
}

/// A plugin producing an [`ObjectIdm`].
pub trait ObjectIdmPlugin: Send + Sync + std::fmt::Debug {
    /// Plugin metadata.
    fn info(&self) -> PluginInfo;

    /// The mapping this plugin provides.
    fn object_idm(&self) -> Arc<dyn ObjectIdm>;
}

/// Turns an in-memory model into bytes.
pub trait Serializer: Send + Sync + std::fmt::Debug {
    /// MIME type of the output.
    fn content_type(&self) -> &str;

    /// File extension of the output, without a dot.
    fn extension(&self) -> &str;

    /// Serialize `model`.
    fn serialize(
        &self,
        model: &IfcModel,
        schema: &SchemaDefinition,
        access_method: AccessMethod,
    ) -> AppResult<Bytes>;
}

/// A plugin producing [`Serializer`]s.
pub trait SerializerPlugin: Send + Sync + std::fmt::Debug {
    /// Plugin metadata.
    fn info(&self) -> PluginInfo;

    /// A serializer instance for one export.
    fn create_serializer(&self) -> Arc<dyn Serializer>;
}
