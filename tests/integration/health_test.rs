//! Health endpoint integration tests.

use axum::http::{Method, StatusCode};

use crate::helpers::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_detailed_health() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::GET, "/api/health/detailed", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["tracked_downloads"], 0);
    assert_eq!(body["data"]["cached_results"], 0);

    let plugins = body["data"]["plugins"].as_array().unwrap();
    assert!(plugins.iter().any(|p| p["name"] == "JsonSerializer"));
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new().await;
    let response = app.send(Method::GET, "/api/files", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
