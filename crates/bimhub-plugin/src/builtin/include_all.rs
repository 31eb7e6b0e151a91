//! Mapping that keeps everything.

use std::sync::Arc;

use crate::traits::{ObjectIdm, ObjectIdmPlugin, PluginInfo, PluginKind};

/// Keeps every object and every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAllObjectIdm;

impl ObjectIdm for IncludeAllObjectIdm {
    fn should_ignore_field(&self, _type_name: &str, _field: &str) -> bool {
        false
    }

    fn should_include_object(&self, _type_name: &str) -> bool {
        true
    }
}

/// Plugin wrapper for [`IncludeAllObjectIdm`].
#[derive(Debug, Default)]
pub struct IncludeAllObjectIdmPlugin;

impl IncludeAllObjectIdmPlugin {
    /// Registered plugin name.
    pub const NAME: &'static str = "IncludeAllObjectIdm";
}

impl ObjectIdmPlugin for IncludeAllObjectIdmPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: Self::NAME.to_string(),
            kind: PluginKind::ObjectIdm,
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Exports every object with all of its fields".to_string(),
        }
    }

    fn object_idm(&self) -> Arc<dyn ObjectIdm> {
        Arc::new(IncludeAllObjectIdm)
    }
}
