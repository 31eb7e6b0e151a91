//! Backend selection.

use std::sync::Arc;

use tracing::info;

use bimhub_core::config::DatabaseConfig;
use bimhub_core::error::AppError;
use bimhub_core::result::AppResult;
use bimhub_entity::model::SchemaDefinition;

use crate::connection::DatabasePool;
use crate::memory::MemoryObjectDatabase;
use crate::migration::run_migrations;
use crate::postgres::PgObjectDatabase;
use crate::session::ObjectDatabase;

/// Open the object database named by `config.backend`.
pub async fn open_database(
    config: &DatabaseConfig,
    schema: SchemaDefinition,
) -> AppResult<Arc<dyn ObjectDatabase>> {
    match config.backend.as_str() {
        "memory" => {
            let db = MemoryObjectDatabase::new(schema);
            if let Some(path) = &config.seed_file {
                db.load_seed_file(path).await?;
            }
            info!("Using in-memory object database");
            Ok(Arc::new(db))
        }
        "postgres" => {
            let pool = DatabasePool::connect(config).await?;
            if config.run_migrations {
                run_migrations(pool.pool()).await?;
            }
            info!("Using PostgreSQL object database");
            Ok(Arc::new(PgObjectDatabase::new(pool, schema)))
        }
        other => Err(AppError::configuration(format!(
            "Unknown database backend '{other}'"
        ))),
    }
}
