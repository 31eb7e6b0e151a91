//! In-memory model representation produced by downloads.

pub mod ifc_model;
pub mod object;
pub mod schema;

pub use ifc_model::{ChangeKind, IfcModel};
pub use object::IfcObject;
pub use schema::{EntityDefinition, SchemaDefinition};
