//! # bimhub-plugin
//!
//! Plugin framework for BimHub downloads. Provides:
//!
//! - Object id mappings ([`ObjectIdm`]) deciding which objects and fields
//!   an export contains
//! - Serializers turning a model into bytes
//! - A registry resolving both kinds of plugin by name
//! - Built-in plugins registered by [`PluginRegistry::with_builtins`]

pub mod builtin;
pub mod registry;
pub mod traits;

pub use registry::PluginRegistry;
pub use traits::{ObjectIdm, ObjectIdmPlugin, PluginInfo, PluginKind, Serializer, SerializerPlugin};
