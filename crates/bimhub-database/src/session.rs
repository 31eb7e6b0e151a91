//! Session traits for the object database.

use std::sync::Arc;

use async_trait::async_trait;

use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Poid, Roid, Uoid};
use bimhub_entity::model::{IfcObject, SchemaDefinition};
use bimhub_entity::store::{Project, Revision, SerializerRecord, User};

use crate::condition::Condition;

/// A handle to the object database that opens sessions.
#[async_trait]
pub trait ObjectDatabase: Send + Sync + std::fmt::Debug + 'static {
    /// Open a new read-only session. The caller owns the session and
    /// must call [`DatabaseSession::close`] when done.
    async fn create_read_only_session(&self) -> AppResult<Box<dyn DatabaseSession>>;

    /// Schema describing the stored entity types.
    fn schema(&self) -> Arc<SchemaDefinition>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// A read-only view of the object database.
///
/// Read-only sessions never mutate the store. After [`close`](Self::close)
/// every query fails with a database error; closing twice is a no-op.
#[async_trait]
pub trait DatabaseSession: Send + Sync + std::fmt::Debug {
    /// Schema describing the stored entity types.
    fn schema(&self) -> &SchemaDefinition;

    /// Look up a user.
    async fn get_user(&self, uoid: Uoid) -> AppResult<Option<User>>;

    /// Look up a project.
    async fn get_project(&self, poid: Poid) -> AppResult<Option<Project>>;

    /// Look up a revision.
    async fn get_revision(&self, roid: Roid) -> AppResult<Option<Revision>>;

    /// All objects of a revision matching `condition`, ordered by oid.
    /// An unknown revision yields an empty result.
    async fn query_objects(&self, roid: Roid, condition: &Condition) -> AppResult<Vec<IfcObject>>;

    /// The serializer record whose name matches exactly.
    async fn query_serializer(&self, name: &str) -> AppResult<Option<SerializerRecord>>;

    /// Release the session.
    async fn close(&self) -> AppResult<()>;
}
