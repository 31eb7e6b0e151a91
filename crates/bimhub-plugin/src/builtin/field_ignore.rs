//! Mapping driven by a configured ignore list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::traits::{ObjectIdm, ObjectIdmPlugin, PluginInfo, PluginKind};

const ANY_TYPE: &str = "*";

/// Drops configured fields and types.
///
/// Entries are `"Type.field"` to drop one field of one type, `"*.field"`
/// to drop a field of every type, or a bare `"Type"` to drop objects of
/// that type altogether. Matching ignores case.
#[derive(Debug, Clone, Default)]
pub struct FieldIgnoreObjectIdm {
    fields: HashMap<String, HashSet<String>>,
    excluded_types: HashSet<String>,
}

impl FieldIgnoreObjectIdm {
    /// Build a mapping from ignore-list entries. Blank entries are skipped.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut idm = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('.') {
                Some((type_name, field)) if !field.is_empty() => {
                    idm.fields
                        .entry(type_name.to_ascii_lowercase())
                        .or_default()
                        .insert(field.to_ascii_lowercase());
                }
                Some(_) => {}
                None => {
                    idm.excluded_types.insert(entry.to_ascii_lowercase());
                }
            }
        }
        idm
    }

    fn ignored_in(&self, key: &str, field: &str) -> bool {
        self.fields.get(key).is_some_and(|fields| fields.contains(field))
    }
}

impl ObjectIdm for FieldIgnoreObjectIdm {
    fn should_ignore_field(&self, type_name: &str, field: &str) -> bool {
        let field = field.to_ascii_lowercase();
        self.ignored_in(ANY_TYPE, &field) || self.ignored_in(&type_name.to_ascii_lowercase(), &field)
    }

    fn should_include_object(&self, type_name: &str) -> bool {
        !self.excluded_types.contains(&type_name.to_ascii_lowercase())
    }
}

/// Plugin wrapper for [`FieldIgnoreObjectIdm`].
#[derive(Debug)]
pub struct FieldIgnoreObjectIdmPlugin {
    idm: Arc<FieldIgnoreObjectIdm>,
}

impl FieldIgnoreObjectIdmPlugin {
    /// Registered plugin name.
    pub const NAME: &'static str = "FieldIgnoreObjectIdm";

    /// Create the plugin from ignore-list entries.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            idm: Arc::new(FieldIgnoreObjectIdm::new(entries)),
        }
    }
}

impl ObjectIdmPlugin for FieldIgnoreObjectIdmPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: Self::NAME.to_string(),
            kind: PluginKind::ObjectIdm,
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Leaves configured fields and types out of exports".to_string(),
        }
    }

    fn object_idm(&self) -> Arc<dyn ObjectIdm> {
        self.idm.clone()
    }
}
