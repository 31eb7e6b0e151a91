//! Records persisted in the object database.

pub mod access;
pub mod project;
pub mod serializer;
pub mod user;

pub use access::AccessMethod;
pub use project::{Project, Revision};
pub use serializer::{ObjectIdmRecord, SerializerRecord};
pub use user::{User, UserType};
