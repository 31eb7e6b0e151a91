//! Plugin registry: resolves object id mappings and serializers by name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use bimhub_core::config::PluginConfig;
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;

use crate::builtin::{FieldIgnoreObjectIdmPlugin, IncludeAllObjectIdmPlugin, JsonSerializerPlugin};
use crate::traits::{ObjectIdmPlugin, PluginInfo, SerializerPlugin};

/// Registry of all available plugins.
#[derive(Debug)]
pub struct PluginRegistry {
    /// Plugin name → object id mapping plugin.
    object_idms: RwLock<HashMap<String, Arc<dyn ObjectIdmPlugin>>>,
    /// Plugin name → serializer plugin.
    serializers: RwLock<HashMap<String, Arc<dyn SerializerPlugin>>>,
    /// Serializer used when a download names none.
    default_serializer: String,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new(default_serializer: impl Into<String>) -> Self {
        Self {
            object_idms: RwLock::new(HashMap::new()),
            serializers: RwLock::new(HashMap::new()),
            default_serializer: default_serializer.into(),
        }
    }

    /// Creates a registry holding the built-in plugins.
    pub fn with_builtins(config: &PluginConfig) -> Self {
        let include_all: Arc<dyn ObjectIdmPlugin> = Arc::new(IncludeAllObjectIdmPlugin);
        let field_ignore: Arc<dyn ObjectIdmPlugin> =
            Arc::new(FieldIgnoreObjectIdmPlugin::new(&config.ignored_fields));
        let json: Arc<dyn SerializerPlugin> = Arc::new(JsonSerializerPlugin);

        let object_idms = [include_all, field_ignore]
            .into_iter()
            .map(|p| (p.info().name, p))
            .collect();
        let serializers = HashMap::from([(json.info().name, json)]);

        info!(
            default_serializer = %config.default_serializer,
            ignored_fields = config.ignored_fields.len(),
            "Registered built-in plugins"
        );

        Self {
            object_idms: RwLock::new(object_idms),
            serializers: RwLock::new(serializers),
            default_serializer: config.default_serializer.clone(),
        }
    }

    /// Registers an object id mapping plugin. Names must be unique.
    pub async fn register_object_idm(&self, plugin: Arc<dyn ObjectIdmPlugin>) -> AppResult<()> {
        let name = plugin.info().name;
        let mut plugins = self.object_idms.write().await;
        if plugins.contains_key(&name) {
            return Err(AppError::conflict(format!(
                "Object IDM plugin '{name}' is already registered"
            )));
        }
        info!(plugin = %name, "Registering object IDM plugin");
        plugins.insert(name, plugin);
        Ok(())
    }

    /// Registers a serializer plugin. Names must be unique.
    pub async fn register_serializer(&self, plugin: Arc<dyn SerializerPlugin>) -> AppResult<()> {
        let name = plugin.info().name;
        let mut plugins = self.serializers.write().await;
        if plugins.contains_key(&name) {
            return Err(AppError::conflict(format!(
                "Serializer plugin '{name}' is already registered"
            )));
        }
        info!(plugin = %name, "Registering serializer plugin");
        plugins.insert(name, plugin);
        Ok(())
    }

    /// Looks up an object id mapping plugin by exact name.
    pub async fn get_object_idm_by_name(&self, name: &str) -> Option<Arc<dyn ObjectIdmPlugin>> {
        self.object_idms.read().await.get(name).cloned()
    }

    /// Looks up a serializer plugin by exact name.
    pub async fn get_serializer_by_name(&self, name: &str) -> Option<Arc<dyn SerializerPlugin>> {
        self.serializers.read().await.get(name).cloned()
    }

    /// Name of the configured default serializer.
    pub fn default_serializer_name(&self) -> &str {
        &self.default_serializer
    }

    /// The configured default serializer plugin.
    pub async fn default_serializer(&self) -> AppResult<Arc<dyn SerializerPlugin>> {
        self.get_serializer_by_name(&self.default_serializer)
            .await
            .ok_or_else(|| {
                AppError::plugin(format!(
                    "Default serializer '{}' is not registered",
                    self.default_serializer
                ))
            })
    }

    /// Metadata of every registered plugin, sorted by kind then name.
    pub async fn list(&self) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self
            .object_idms
            .read()
            .await
            .values()
            .map(|p| p.info())
            .collect();
        infos.extend(self.serializers.read().await.values().map(|p| p.info()));
        infos.sort_by(|a, b| (a.kind as u8, &a.name).cmp(&(b.kind as u8, &b.name)));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimhub_core::error::ErrorKind;

    fn config() -> PluginConfig {
        PluginConfig {
            ignored_fields: vec!["*.OwnerHistory".to_string()],
            ..PluginConfig::default()
        }
    }

    #[tokio::test]
    async fn test_builtins_resolve_by_name() {
        let registry = PluginRegistry::with_builtins(&config());
        let idm = registry
            .get_object_idm_by_name("FieldIgnoreObjectIdm")
            .await
            .unwrap()
            .object_idm();
        assert!(idm.should_ignore_field("IfcWall", "OwnerHistory"));
        assert!(registry.get_object_idm_by_name("IncludeAllObjectIdm").await.is_some());
        assert!(registry.get_object_idm_by_name("fieldignoreobjectidm").await.is_none());

        let json = registry.default_serializer().await.unwrap();
        assert_eq!(json.create_serializer().content_type(), "application/json");
        assert_eq!(registry.list().await.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let registry = PluginRegistry::with_builtins(&config());
        let err = registry
            .register_serializer(Arc::new(JsonSerializerPlugin))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_default_serializer() {
        let registry = PluginRegistry::new("Ifc2x3Serializer");
        let err = registry.default_serializer().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Plugin);
    }
}
