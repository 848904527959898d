mod common;

use axum::http::{Method, StatusCode};
use axum::Router;
use blueprint_sdk::{app_router, AppState, DirFileStore, PublishOrchestrator, SchemaRegistry};
use common::{decode_json, product_json, request, ScriptedStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(dir: &std::path::Path) -> Router {
    let registry = Arc::new(SchemaRegistry::new(Arc::new(ScriptedStore::new()), Duration::from_secs(5)));
    let publisher = Arc::new(PublishOrchestrator::new(registry, Arc::new(DirFileStore::new(dir))));
    app_router(AppState::new(publisher, None))
}

async fn call(router: &Router, method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request(method, uri, role, body))
        .await
        .expect("response");
    let status = response.status();
    if status == StatusCode::NO_CONTENT {
        return (status, Value::Null);
    }
    (status, decode_json(response).await)
}

#[tokio::test]
async fn publish_requires_admin() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());

    let (status, _) = call(&router, Method::POST, "/models", None, Some(product_json())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&router, Method::POST, "/models", Some("Manager"), Some(product_json())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!("forbidden"));
    assert!(!dir.path().join("Product.json").exists());

    let (status, body) = call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], json!("Product"));
    assert_eq!(body["meta"]["revision"], json!(1));

    let (status, body) = call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["revision"], json!(2));
}

#[tokio::test]
async fn invalid_definition_is_unprocessable() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    let body = json!({
        "name": "Product",
        "fields": [{ "name": "price", "type": "money" }],
        "rbac": { "Admin": ["all"] }
    });
    let (status, body) = call(&router, Method::POST, "/models", Some("Admin"), Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("validation_error"));

    let (status, _) = call(&router, Method::GET, "/api/Product", Some("Admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_crud_with_role_checks() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    let (status, _) = call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;
    assert_eq!(status, StatusCode::CREATED);

    let pen = json!({ "name": "Pen", "price": 1.5, "inStock": true });

    let (status, body) = call(&router, Method::POST, "/api/Product", Some("Viewer"), Some(pen.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!("permission_denied"));

    let (status, body) = call(&router, Method::POST, "/api/Product", Some("Admin"), Some(pen)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().expect("id").to_string();
    assert_eq!(body["data"]["price"], json!(1.5));
    assert_eq!(body["data"]["inStock"], json!(true));
    assert!(body["data"]["created_at"].is_string());

    let item = format!("/api/Product/{}", id);

    let (status, _) = call(&router, Method::DELETE, &item, Some("Manager"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&router, Method::PUT, &item, Some("Manager"), Some(json!({ "price": 2 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!(2.0));
    assert_eq!(body["data"]["name"], json!("Pen"));

    let (status, body) = call(&router, Method::GET, "/api/Product", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], json!(1));

    let (status, body) = call(&router, Method::GET, &item, Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(id));

    let (status, _) = call(&router, Method::DELETE, &item, Some("Admin"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&router, Method::GET, &item, Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&router, Method::DELETE, &item, Some("Admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payload_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;

    let cases = [
        json!({ "price": 1 }),
        json!({ "name": "Pen", "price": "cheap" }),
        json!({ "name": "Pen", "price": 1, "colour": "red" }),
    ];
    for payload in cases {
        let (status, body) = call(&router, Method::POST, "/api/Product", Some("Manager"), Some(payload.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload {}", payload);
        assert_eq!(body["error"]["code"], json!("validation_error"));
    }

    let (_, body) = call(&router, Method::GET, "/api/Product", Some("Admin"), None).await;
    assert_eq!(body["meta"]["count"], json!(0));
}

#[tokio::test]
async fn redefinition_applies_to_next_request() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;

    let (status, _) = call(&router, Method::GET, "/api/Product", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::OK);

    let mut narrowed = product_json();
    narrowed["rbac"]["Viewer"] = json!([]);
    let (status, _) = call(&router, Method::POST, "/models", Some("Admin"), Some(narrowed)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&router, Method::GET, "/api/Product", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn caller_identity_is_required() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;

    let (status, body) = call(&router, Method::GET, "/api/Product", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("unauthorized"));

    let (status, _) = call(&router, Method::GET, "/api/Product", Some("Owner"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_model_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    let (status, body) = call(&router, Method::GET, "/api/Ghost", Some("Admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("not_found"));
}

#[tokio::test]
async fn model_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;
    let note = json!({
        "name": "Note",
        "fields": [{ "name": "text", "type": "string" }],
        "rbac": { "Admin": ["all"] }
    });
    call(&router, Method::POST, "/models", Some("Admin"), Some(note)).await;

    let (status, body) = call(&router, Method::GET, "/models", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], json!(2));
    assert_eq!(body["data"][0]["name"], json!("Note"));
    assert_eq!(body["data"][0]["rbac"]["Viewer"], json!([]));
    assert_eq!(body["data"][1]["name"], json!("Product"));

    let (status, body) = call(&router, Method::GET, "/models/Product", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fields"][2]["name"], json!("inStock"));

    let (status, _) = call(&router, Method::GET, "/models/Ghost", Some("Viewer"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let router = app(dir.path());
    call(&router, Method::POST, "/models", Some("Admin"), Some(product_json())).await;

    let (status, body) = call(&router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = call(&router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["models"], json!(1));
}
