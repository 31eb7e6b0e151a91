//! Download endpoint integration tests.

use axum::body::to_bytes;
use axum::http::{Method, StatusCode, header};
use serde_json::{Value, json};

use bimhub_entity::action::ActionState;

use crate::helpers::{ADMIN, DESIGNER, FIRST, GUEST, LATEST, TestApp};

fn revision(roid: i64, uoid: i64) -> Value {
    json!({
        "download_type": "DOWNLOAD_REVISION",
        "roids": [roid],
        "uoid": uoid,
        "caller_id": "integration",
    })
}

#[tokio::test]
async fn test_revision_download_lifecycle() {
    let app = TestApp::new().await;

    let ticket = app.submit(revision(LATEST, DESIGNER)).await;
    let finished = app.wait(ticket).await;
    assert_eq!(finished.state, ActionState::Finished);
    assert_eq!(finished.progress, 100);

    let (status, body) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["ticket"], ticket.to_string());
    assert_eq!(body["data"]["state"], "FINISHED");
    assert_eq!(body["data"]["progress"], 100);
    assert_eq!(body["data"]["cancelled"], false);

    let response = app
        .send(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("revision-2.json"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["header"]["schema"], "IFC2X3");
    assert_eq!(document["header"]["access_method"], "REST");
    assert_eq!(document["header"]["object_count"], 3);
}

#[tokio::test]
async fn test_repeated_download_served_from_cache() {
    let app = TestApp::new().await;

    let first = app.submit(revision(LATEST, DESIGNER)).await;
    app.wait(first).await;
    let queries = app.database.stats().object_queries();

    let second = app.submit(revision(LATEST, ADMIN)).await;
    let state = app.wait(second).await;
    assert_eq!(state.state, ActionState::Finished);
    assert_eq!(state.progress, 100);
    assert_eq!(app.database.stats().object_queries(), queries);

    let response = app
        .send(Method::GET, &format!("/api/downloads/{second}/data"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_compare_download_marks_changes() {
    let app = TestApp::new().await;

    let ticket = app
        .submit(json!({
            "download_type": "DOWNLOAD_COMPARE",
            "roids": [FIRST, LATEST],
            "compare_identifier": "GUID_ID",
            "compare_type": "ALL",
            "uoid": DESIGNER,
            "caller_id": "integration",
        }))
        .await;
    assert_eq!(app.wait(ticket).await.state, ActionState::Finished);

    let response = app
        .send(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["header"]["object_count"], 1);
    assert_eq!(document["objects"][0]["oid"], 1003);
    assert_eq!(document["objects"][0]["change"], "added");
}

#[tokio::test]
async fn test_list_downloads_by_caller() {
    let app = TestApp::new().await;

    let mut first = revision(FIRST, DESIGNER);
    first["caller_id"] = json!("viewer-1");
    let mut latest = revision(LATEST, DESIGNER);
    latest["caller_id"] = json!("viewer-1");
    let mut other = revision(LATEST, ADMIN);
    other["download_type"] = json!("DOWNLOAD_PROJECTS");
    other["caller_id"] = json!("viewer-2");

    for body in [first, latest, other] {
        let ticket = app.submit(body).await;
        app.wait(ticket).await;
    }

    let (status, body) = app
        .request(Method::GET, "/api/downloads?caller_id=viewer-1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let downloads = body["data"].as_array().unwrap();
    assert_eq!(downloads.len(), 2);
    assert!(downloads.iter().all(|d| d["state"] == "FINISHED"));
}

#[tokio::test]
async fn test_cancel_running_download() {
    let app = TestApp::new().await;
    app.database.hold_object_queries(true);

    let ticket = app.submit(revision(LATEST, DESIGNER)).await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    let (status, body) = app
        .request(Method::POST, &format!("/api/downloads/{ticket}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cancelled"], true);

    let state = app.wait(ticket).await;
    app.database.hold_object_queries(false);
    assert_eq!(state.state, ActionState::Finished);
    assert!(state.cancelled);

    let (status, _) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unauthorized_user_fails() {
    let app = TestApp::new().await;

    let ticket = app.submit(revision(LATEST, GUEST)).await;
    let state = app.wait(ticket).await;
    assert_eq!(state.state, ActionState::Failed);
    assert_eq!(state.progress, 100);
    assert!(!state.errors.is_empty());

    let (status, body) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "FAILED");

    let (status, _) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cached_download_not_served_to_unauthorized_user() {
    let app = TestApp::new().await;

    let first = app.submit(revision(LATEST, DESIGNER)).await;
    assert_eq!(app.wait(first).await.state, ActionState::Finished);

    let ticket = app.submit(revision(LATEST, GUEST)).await;
    let state = app.wait(ticket).await;
    assert_eq!(state.state, ActionState::Failed);

    let (status, _) = app
        .request(Method::GET, &format!("/api/downloads/{ticket}/data"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_submissions_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/downloads",
            Some(json!({
                "download_type": "DOWNLOAD_BY_GUIDS",
                "roids": [],
                "uoid": DESIGNER,
                "caller_id": "integration",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");

    let mut anonymous = revision(LATEST, DESIGNER);
    anonymous["caller_id"] = json!("");
    let (status, body) = app
        .request(Method::POST, "/api/downloads", Some(anonymous))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].is_object());

    assert!(app.state.downloads.manager().is_empty());
}

#[tokio::test]
async fn test_unknown_ticket() {
    let app = TestApp::new().await;
    let unknown = bimhub_core::types::id::Ticket::new();

    let (status, body) = app
        .request(Method::GET, &format!("/api/downloads/{unknown}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, _) = app
        .request(Method::POST, &format!("/api/downloads/{unknown}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .send(Method::GET, "/api/downloads/not-a-ticket", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
