//! PostgreSQL object store.
//!
//! Every session is a `READ ONLY` transaction; closing it rolls back.
//! Object conditions are translated into SQL predicates so filtering
//! happens in the database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use bimhub_core::error::{AppError, ErrorKind};
use bimhub_core::result::AppResult;
use bimhub_core::types::id::{Oid, Poid, Roid, Uoid};
use bimhub_entity::model::{IfcObject, SchemaDefinition};
use bimhub_entity::store::{ObjectIdmRecord, Project, Revision, SerializerRecord, User, UserType};

use crate::condition::Condition;
use crate::connection::DatabasePool;
use crate::session::{DatabaseSession, ObjectDatabase};

const DEADLOCK_DETECTED: &str = "40P01";

/// Map a sqlx error, keeping deadlocks distinguishable.
fn map_sqlx_error(context: &str, e: sqlx::Error) -> AppError {
    let kind = match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(DEADLOCK_DETECTED) => {
            ErrorKind::Deadlock
        }
        _ => ErrorKind::Database,
    };
    AppError::with_source(kind, format!("{context}: {e}"), e)
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    uoid: i64,
    username: String,
    user_type: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let user_type = if row.user_type.eq_ignore_ascii_case("admin") {
            UserType::Admin
        } else {
            UserType::User
        };
        Self {
            uoid: Uoid::new(row.uoid),
            username: row.username,
            user_type,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    poid: i64,
    name: String,
    last_revision: Option<i64>,
}

#[derive(Debug, sqlx::FromRow)]
struct RevisionRow {
    roid: i64,
    poid: i64,
    number: i32,
    comment: String,
    created_at: DateTime<Utc>,
}

impl From<RevisionRow> for Revision {
    fn from(row: RevisionRow) -> Self {
        Self {
            roid: Roid::new(row.roid),
            poid: Poid::new(row.poid),
            number: row.number,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ObjectRow {
    oid: i64,
    guid: Option<String>,
    type_name: String,
    name: Option<String>,
    owner_uoid: i64,
    attributes: Json<BTreeMap<String, serde_json::Value>>,
}

impl From<ObjectRow> for IfcObject {
    fn from(row: ObjectRow) -> Self {
        Self {
            oid: Oid::new(row.oid),
            guid: row.guid,
            type_name: row.type_name,
            name: row.name,
            owner: Uoid::new(row.owner_uoid),
            attributes: row.attributes.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SerializerRow {
    name: String,
    plugin: String,
    enabled: bool,
    object_idm_name: Option<String>,
    object_idm_plugin: Option<String>,
}

impl From<SerializerRow> for SerializerRecord {
    fn from(row: SerializerRow) -> Self {
        let object_idm = match (row.object_idm_name, row.object_idm_plugin) {
            (Some(name), Some(plugin)) => Some(ObjectIdmRecord { name, plugin }),
            _ => None,
        };
        Self {
            name: row.name,
            plugin: row.plugin,
            enabled: row.enabled,
            object_idm,
        }
    }
}

/// Append `condition` as a SQL predicate over `ifc_objects`.
fn push_condition(builder: &mut QueryBuilder<'_, Postgres>, condition: &Condition) {
    match condition {
        Condition::All => {
            builder.push("TRUE");
        }
        Condition::OidIn(oids) => {
            builder.push("oid = ANY(");
            builder.push_bind(oids.iter().map(|o| o.value()).collect::<Vec<i64>>());
            builder.push(")");
        }
        Condition::GuidIn(guids) => {
            builder.push("guid = ANY(");
            builder.push_bind(guids.iter().cloned().collect::<Vec<String>>());
            builder.push(")");
        }
        Condition::TypeIn(names) => {
            builder.push("LOWER(type_name) = ANY(");
            builder.push_bind(names.iter().cloned().collect::<Vec<String>>());
            builder.push(")");
        }
        Condition::OwnerIsNot(uoid) => {
            builder.push("owner_uoid <> ");
            builder.push_bind(uoid.value());
        }
        Condition::And(conditions) if conditions.is_empty() => {
            builder.push("TRUE");
        }
        Condition::And(conditions) => {
            builder.push("(");
            for (i, inner) in conditions.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_condition(builder, inner);
            }
            builder.push(")");
        }
        Condition::Not(inner) => {
            builder.push("NOT (");
            push_condition(builder, inner);
            builder.push(")");
        }
    }
}

/// Object database backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgObjectDatabase {
    pool: DatabasePool,
    schema: Arc<SchemaDefinition>,
}

impl PgObjectDatabase {
    /// Create a database over an open pool.
    pub fn new(pool: DatabasePool, schema: SchemaDefinition) -> Self {
        Self {
            pool,
            schema: Arc::new(schema),
        }
    }

    /// The connection pool.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

#[async_trait]
impl ObjectDatabase for PgObjectDatabase {
    async fn create_read_only_session(&self) -> AppResult<Box<dyn DatabaseSession>> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to begin session", e))?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to mark session read-only", e))?;
        debug!("Opened read-only PostgreSQL session");
        Ok(Box::new(PgSession {
            tx: Mutex::new(Some(tx)),
            schema: Arc::clone(&self.schema),
        }))
    }

    fn schema(&self) -> Arc<SchemaDefinition> {
        Arc::clone(&self.schema)
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.pool.health_check().await
    }
}

/// A read-only transaction over the object store.
pub struct PgSession {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
    schema: Arc<SchemaDefinition>,
}

impl std::fmt::Debug for PgSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSession")
            .field("schema", &self.schema.name)
            .finish_non_exhaustive()
    }
}

fn closed() -> AppError {
    AppError::database("Session is closed")
}

#[async_trait]
impl DatabaseSession for PgSession {
    fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    async fn get_user(&self, uoid: Uoid) -> AppResult<Option<User>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT uoid, username, user_type FROM users WHERE uoid = $1",
        )
        .bind(uoid.value())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to find user", e))?;
        Ok(row.map(User::from))
    }

    async fn get_project(&self, poid: Poid) -> AppResult<Option<Project>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let Some(row) = sqlx::query_as::<_, ProjectRow>(
            "SELECT poid, name, last_revision FROM projects WHERE poid = $1",
        )
        .bind(poid.value())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to find project", e))?
        else {
            return Ok(None);
        };

        let authorized: Vec<i64> =
            sqlx::query_scalar("SELECT uoid FROM project_users WHERE poid = $1 ORDER BY uoid")
                .bind(row.poid)
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to list project users", e))?;

        Ok(Some(Project {
            poid: Poid::new(row.poid),
            name: row.name,
            last_revision: row.last_revision.map(Roid::new),
            authorized_users: authorized.into_iter().map(Uoid::new).collect(),
        }))
    }

    async fn get_revision(&self, roid: Roid) -> AppResult<Option<Revision>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let row = sqlx::query_as::<_, RevisionRow>(
            "SELECT roid, poid, number, comment, created_at FROM revisions WHERE roid = $1",
        )
        .bind(roid.value())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to find revision", e))?;
        Ok(row.map(Revision::from))
    }

    async fn query_objects(&self, roid: Roid, condition: &Condition) -> AppResult<Vec<IfcObject>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        if condition.is_empty_selection() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT oid, guid, type_name, name, owner_uoid, attributes \
             FROM ifc_objects WHERE roid = ",
        );
        builder.push_bind(roid.value());
        builder.push(" AND ");
        push_condition(&mut builder, condition);
        builder.push(" ORDER BY oid");

        let rows = builder
            .build_query_as::<ObjectRow>()
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to query objects", e))?;
        Ok(rows.into_iter().map(IfcObject::from).collect())
    }

    async fn query_serializer(&self, name: &str) -> AppResult<Option<SerializerRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(closed)?;
        let row = sqlx::query_as::<_, SerializerRow>(
            "SELECT name, plugin, enabled, object_idm_name, object_idm_plugin \
             FROM serializers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to find serializer", e))?;
        Ok(row.map(SerializerRecord::from))
    }

    async fn close(&self) -> AppResult<()> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Ok(());
        };
        tx.rollback()
            .await
            .map_err(|e| map_sqlx_error("Failed to close session", e))?;
        debug!("Closed PostgreSQL session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_for(condition: &Condition) -> String {
        let mut builder = QueryBuilder::<Postgres>::new("");
        push_condition(&mut builder, condition);
        builder.sql().to_string()
    }

    #[test]
    fn test_condition_translation() {
        assert_eq!(sql_for(&Condition::All), "TRUE");
        assert_eq!(
            sql_for(&Condition::type_in(["IfcWall"]).and(Condition::OwnerIsNot(Uoid::new(3)))),
            "(LOWER(type_name) = ANY($1) AND owner_uoid <> $2)"
        );
        assert_eq!(
            sql_for(&Condition::Not(Box::new(Condition::OidIn([Oid::new(1)].into())))),
            "NOT (oid = ANY($1))"
        );
        assert_eq!(sql_for(&Condition::And(vec![])), "TRUE");
    }

    #[test]
    fn test_serializer_row_requires_complete_idm() {
        let record = SerializerRecord::from(SerializerRow {
            name: "Json".to_string(),
            plugin: "JsonSerializer".to_string(),
            enabled: true,
            object_idm_name: Some("ignore".to_string()),
            object_idm_plugin: None,
        });
        assert!(record.object_idm.is_none());
    }

    #[test]
    fn test_plain_errors_map_to_database() {
        let err = map_sqlx_error("Failed", sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ErrorKind::Database);
    }
}
