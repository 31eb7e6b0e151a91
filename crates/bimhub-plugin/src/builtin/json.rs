//! JSON serializer.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use bimhub_core::result::AppResult;
use bimhub_entity::model::{ChangeKind, IfcModel, IfcObject, SchemaDefinition};
use bimhub_entity::store::AccessMethod;

use crate::traits::{PluginInfo, PluginKind, Serializer, SerializerPlugin};

#[derive(Serialize)]
struct Document<'a> {
    header: Header<'a>,
    objects: Vec<Entry<'a>>,
}

#[derive(Serialize)]
struct Header<'a> {
    schema: &'a str,
    access_method: AccessMethod,
    object_count: usize,
}

#[derive(Serialize)]
struct Entry<'a> {
    #[serde(flatten)]
    object: &'a IfcObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    change: Option<ChangeKind>,
}

/// Writes a model as one JSON document, objects ordered by oid.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn extension(&self) -> &str {
        "json"
    }

    fn serialize(
        &self,
        model: &IfcModel,
        schema: &SchemaDefinition,
        access_method: AccessMethod,
    ) -> AppResult<Bytes> {
        let document = Document {
            header: Header {
                schema: &schema.name,
                access_method,
                object_count: model.len(),
            },
            objects: model
                .entries()
                .into_iter()
                .map(|(object, change)| Entry { object, change })
                .collect(),
        };
        Ok(Bytes::from(serde_json::to_vec(&document)?))
    }
}

/// Plugin wrapper for [`JsonSerializer`].
#[derive(Debug, Default)]
pub struct JsonSerializerPlugin;

impl JsonSerializerPlugin {
    /// Registered plugin name.
    pub const NAME: &'static str = "JsonSerializer";
}

impl SerializerPlugin for JsonSerializerPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: Self::NAME.to_string(),
            kind: PluginKind::Serializer,
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Serializes models as JSON documents".to_string(),
        }
    }

    fn create_serializer(&self) -> Arc<dyn Serializer> {
        Arc::new(JsonSerializer)
    }
}
