//! Application builder: wires the download stack, router and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use bimhub_cache::{DownloadCache, DownloadCacheManager};
use bimhub_core::config::AppConfig;
use bimhub_core::error::{AppError, ErrorKind};
use bimhub_core::result::AppResult;
use bimhub_database::open_database;
use bimhub_entity::model::SchemaDefinition;
use bimhub_plugin::PluginRegistry;
use bimhub_worker::{DownloadDependencies, DownloadService, LongActionManager};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}

/// Opens the object database and cache, registers plugins and creates the
/// download service.
pub async fn build_state(config: AppConfig) -> AppResult<AppState> {
    info!(backend = %config.database.backend, "Opening object database");
    let database = open_database(&config.database, SchemaDefinition::ifc2x3_core()).await?;

    info!(
        enabled = config.cache.enabled,
        provider = %config.cache.provider,
        "Initializing download cache"
    );
    let cache: Arc<dyn DownloadCache> = Arc::new(DownloadCacheManager::new(&config.cache).await?);

    let plugins = Arc::new(PluginRegistry::with_builtins(&config.plugins));
    plugins.default_serializer().await?;

    let manager = LongActionManager::new(config.worker.clone());
    let downloads = DownloadService::new(
        DownloadDependencies {
            database,
            cache,
            plugins,
        },
        manager,
    );
    Ok(AppState::new(config, downloads))
}

/// Runs the BimHub server until a shutdown signal arrives.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    info!("Starting BimHub v{}", env!("CARGO_PKG_VERSION"));

    let state = build_state(config).await?;
    state.downloads.manager().start_reaper();

    let addr = state.config.server.bind_address();
    let grace = Duration::from_secs(state.config.server.shutdown_grace_seconds);
    let downloads = state.downloads.clone();

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e)
    })?;
    info!(address = %addr, "BimHub server listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))?;

    downloads.shutdown(grace).await;
    info!("BimHub server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_with_defaults() {
        let state = build_state(AppConfig::default()).await.unwrap();
        assert!(state.downloads.manager().is_empty());
        assert_eq!(state.config.server.port, 8082);
    }

    #[tokio::test]
    async fn test_build_state_rejects_bad_config() {
        let mut config = AppConfig::default();
        config.database.backend = "oracle".to_string();
        assert!(build_state(config).await.is_err());

        let mut config = AppConfig::default();
        config.plugins.default_serializer = "IfcStepSerializer".to_string();
        assert!(build_state(config).await.is_err());
    }
}
