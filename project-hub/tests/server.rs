use axum::{routing::get, Router};
use project_hub::api;
use project_hub_core::events::EventBus;
use project_hub_core::tree::ProjectStore;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::util::ServiceExt;

#[tokio::test]
async fn server_health_endpoint() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = Arc::new(RwLock::new(ProjectStore::open(tempdir.path()).unwrap()));
    let app = Router::new()
        .merge(api::router(store, EventBus::new()))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let resp = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");

    server.abort();
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = Arc::new(RwLock::new(ProjectStore::open(tempdir.path()).unwrap()));
    let app = Router::new().merge(api::router(store, EventBus::new()));

    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/projects")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn project_folder_file_flow() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = ProjectStore::open(tempdir.path()).unwrap();
    let company = store
        .create_company("Delta Construction Group", None)
        .unwrap();
    let store = Arc::new(RwLock::new(store));
    let app = Router::new().merge(api::router(store, EventBus::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();

    // ana opens a project and becomes its manager
    let resp = client
        .post(format!("http://{}/projects", addr))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({
            "company_id": company.id,
            "name": "Riverside Plant",
            "code": "RP-24"
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let project: serde_json::Value = resp.json().await.unwrap();
    let project_id = project["id"].as_str().unwrap().to_string();
    assert_eq!(project["status"], "open");
    assert_eq!(project["members"][0]["role"], "manager");

    // luis joins as a plain member
    let resp = client
        .post(format!("http://{}/projects/{}/members", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "user_id": "luis", "role": "member" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // a folder at the top level
    let resp = client
        .post(format!("http://{}/projects/{}/folders", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "name": "Plans" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let folder: serde_json::Value = resp.json().await.unwrap();
    let folder_id = folder["id"].as_str().unwrap().to_string();

    // luis uploads into it
    let resp = client
        .post(format!("http://{}/folders/{}/files", addr, folder_id))
        .header("X-User-Id", "luis")
        .json(&serde_json::json!({
            "name": "Site Layout.dwg",
            "mime_type": "image/vnd.dwg",
            "size_bytes": 48000
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let file: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(file["version"], 1);
    assert_eq!(file["extension"], "dwg");

    // the folder listing shows it
    let resp = client
        .get(format!(
            "http://{}/projects/{}/children?parent={}",
            addr, project_id, folder_id
        ))
        .header("X-User-Id", "luis")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let listing: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(listing["files"].as_array().unwrap().len(), 1);
    assert_eq!(listing["files"][0]["name"], "Site Layout.dwg");

    // the audit trail tells the same story
    let resp = client
        .get(format!("http://{}/projects/{}/activity", addr, project_id))
        .header("X-User-Id", "ana")
        .send()
        .await
        .unwrap();
    let entries: serde_json::Value = resp.json().await.unwrap();
    let kinds: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(
        kinds,
        ["project_created", "member_added", "folder_created", "file_added"]
    );

    server.abort();
}

#[tokio::test]
async fn error_mapping_covers_the_usual_suspects() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = ProjectStore::open(tempdir.path()).unwrap();
    let company = store.create_company("Acme Works", None).unwrap();
    let store = Arc::new(RwLock::new(store));
    let app = Router::new().merge(api::router(store, EventBus::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/projects", addr))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "company_id": company.id, "name": "Depot" }))
        .send()
        .await
        .unwrap();
    let project: serde_json::Value = resp.json().await.unwrap();
    let project_id = project["id"].as_str().unwrap().to_string();

    // unknown project
    let resp = client
        .get(format!("http://{}/projects/project-na", addr))
        .header("X-User-Id", "ana")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    // outsider asking for the tree
    let resp = client
        .get(format!("http://{}/projects/{}/children", addr, project_id))
        .header("X-User-Id", "stranger")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

    // blank folder name
    let resp = client
        .post(format!("http://{}/projects/{}/folders", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    // moving a folder under its own child
    let resp = client
        .post(format!("http://{}/projects/{}/folders", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "name": "Outer" }))
        .send()
        .await
        .unwrap();
    let outer: serde_json::Value = resp.json().await.unwrap();
    let outer_id = outer["id"].as_str().unwrap().to_string();
    let resp = client
        .post(format!("http://{}/projects/{}/folders", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "parent_id": outer_id, "name": "Inner" }))
        .send()
        .await
        .unwrap();
    let inner: serde_json::Value = resp.json().await.unwrap();
    let inner_id = inner["id"].as_str().unwrap().to_string();
    let resp = client
        .put(format!("http://{}/folders/{}/move", addr, outer_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "new_parent_id": inner_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    // duplicate membership
    let resp = client
        .post(format!("http://{}/projects/{}/members", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "user_id": "ana", "role": "member" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    server.abort();
}

#[tokio::test]
async fn bulk_import_over_http_is_idempotent() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = ProjectStore::open(tempdir.path()).unwrap();
    let company = store.create_company("Acme Works", None).unwrap();
    let store = Arc::new(RwLock::new(store));
    let app = Router::new().merge(api::router(store, EventBus::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(axum::serve(listener, app.into_make_service()).into_future());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/projects", addr))
        .header("X-User-Id", "ana")
        .json(&serde_json::json!({ "company_id": company.id, "name": "Depot" }))
        .send()
        .await
        .unwrap();
    let project: serde_json::Value = resp.json().await.unwrap();
    let project_id = project["id"].as_str().unwrap().to_string();

    let tree = serde_json::json!({
        "roots": [{
            "name": "Closeout",
            "files": [
                { "name": "Summary.pdf", "mime_type": "application/pdf", "size_bytes": 1000 }
            ],
            "children": [{
                "name": "Certificates",
                "files": [
                    { "name": "Cert A.pdf", "mime_type": "application/pdf", "size_bytes": 2000 }
                ]
            }]
        }]
    });

    let resp = client
        .post(format!("http://{}/projects/{}/import", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&tree)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["folders_created"], 2);
    assert_eq!(report["files_created"], 2);

    // same payload again: every derived id already exists
    let resp = client
        .post(format!("http://{}/projects/{}/import", addr, project_id))
        .header("X-User-Id", "ana")
        .json(&tree)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["folders_created"], 0);
    assert_eq!(report["files_created"], 0);

    server.abort();
}
