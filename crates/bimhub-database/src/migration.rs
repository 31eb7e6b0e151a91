//! Object store schema migrations.
//!
//! Downloads only read, but they expect every table below to exist. After
//! migrating, the tables are checked so that a store migrated by another
//! tool fails at startup instead of in the first download.

use std::collections::HashSet;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::{debug, info};

use bimhub_core::error::{AppError, ErrorKind};
use bimhub_core::result::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Tables a download reads from.
pub const OBJECT_STORE_TABLES: [&str; 6] = [
    "users",
    "projects",
    "project_users",
    "revisions",
    "ifc_objects",
    "serializers",
];

/// Apply pending migrations, then check the object store tables.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!(
        available = MIGRATOR.iter().count(),
        "Running object store migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to migrate object store tables: {e}"),
            e,
        )
    })?;

    let present: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = current_schema()",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to list object store tables: {e}"),
            e,
        )
    })?;
    let missing = missing_tables(&present);
    if !missing.is_empty() {
        return Err(AppError::new(
            ErrorKind::Database,
            format!("Object store is missing tables: {}", missing.join(", ")),
        ));
    }
    debug!(tables = OBJECT_STORE_TABLES.len(), "Object store tables present");

    info!("Object store migrations completed");
    Ok(())
}

/// The object store tables absent from `present`, in declaration order.
pub fn missing_tables(present: &[String]) -> Vec<&'static str> {
    let present: HashSet<&str> = present.iter().map(String::as_str).collect();
    OBJECT_STORE_TABLES
        .into_iter()
        .filter(|table| !present.contains(table))
        .collect()
}
