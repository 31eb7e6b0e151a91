//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use bimhub_api::{AppState, build_app};
use bimhub_cache::{DownloadCache, DownloadCacheManager};
use bimhub_core::config::AppConfig;
use bimhub_core::types::id::Ticket;
use bimhub_database::MemoryObjectDatabase;
use bimhub_entity::action::LongActionState;
use bimhub_entity::model::SchemaDefinition;
use bimhub_plugin::PluginRegistry;
use bimhub_worker::{DownloadDependencies, DownloadService, LongActionManager};

/// Administrator in `config/seed.json`.
pub const ADMIN: i64 = 1;
/// Regular user authorized on the demo project.
pub const DESIGNER: i64 = 2;
/// Not authorized on any project.
pub const GUEST: i64 = 3;
/// First demo revision.
pub const FIRST: i64 = 1;
/// Latest demo revision.
pub const LATEST: i64 = 2;

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for waiting on downloads
    pub state: AppState,
    /// The seeded store behind the router
    pub database: MemoryObjectDatabase,
}

impl TestApp {
    /// Create an application backed by the demo seed.
    pub async fn new() -> Self {
        let config = AppConfig::default();

        let database = MemoryObjectDatabase::new(SchemaDefinition::ifc2x3_core());
        database
            .load_seed_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/seed.json"))
            .await
            .expect("Failed to load seed");

        let cache: Arc<dyn DownloadCache> = Arc::new(
            DownloadCacheManager::new(&config.cache)
                .await
                .expect("Failed to init cache"),
        );
        let plugins = Arc::new(PluginRegistry::with_builtins(&config.plugins));

        let downloads = DownloadService::new(
            DownloadDependencies {
                database: Arc::new(database.clone()),
                cache,
                plugins,
            },
            LongActionManager::new(config.worker.clone()),
        );
        let state = AppState::new(config, downloads);

        Self {
            router: build_app(state.clone()),
            state,
            database,
        }
    }

    /// Send a request and return the raw response.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request and parse the JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.send(method, uri, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Response is not JSON")
        };
        (status, json)
    }

    /// Submit a download and return its ticket.
    pub async fn submit(&self, body: Value) -> Ticket {
        let (status, json) = self.request(Method::POST, "/api/downloads", Some(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED, "submit failed: {json}");
        serde_json::from_value(json["data"]["ticket"].clone()).expect("Missing ticket")
    }

    /// Wait until a download reaches a terminal state.
    pub async fn wait(&self, ticket: Ticket) -> LongActionState {
        self.state
            .downloads
            .wait(ticket)
            .await
            .expect("Unknown ticket")
    }
}
