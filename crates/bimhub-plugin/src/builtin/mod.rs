//! Plugins shipped with the server.

pub mod field_ignore;
pub mod include_all;
pub mod json;

pub use field_ignore::{FieldIgnoreObjectIdm, FieldIgnoreObjectIdmPlugin};
pub use include_all::{IncludeAllObjectIdm, IncludeAllObjectIdmPlugin};
pub use json::{JsonSerializer, JsonSerializerPlugin};
