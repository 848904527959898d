#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use blueprint_sdk::config::StorageBinding;
use blueprint_sdk::store::Row;
use blueprint_sdk::{MemoryTableStore, ModelDefinition, StorageError, TableStore};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory store whose `ensure_table` can be slowed down per table or made to fail.
pub struct ScriptedStore {
    inner: MemoryTableStore,
    slow: Mutex<HashSet<String>>,
    delay: Duration,
    fail_ensure: AtomicBool,
}

impl ScriptedStore {
    pub fn new() -> Self {
        ScriptedStore {
            inner: MemoryTableStore::new(),
            slow: Mutex::new(HashSet::new()),
            delay: Duration::from_millis(400),
            fail_ensure: AtomicBool::new(false),
        }
    }

    pub fn slow_for(&self, table: &str) {
        self.slow.lock().unwrap().insert(table.to_string());
    }

    pub fn fail_ensure(&self, fail: bool) {
        self.fail_ensure.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TableStore for ScriptedStore {
    async fn ensure_table(&self, binding: &StorageBinding) -> Result<(), StorageError> {
        let slow = self.slow.lock().unwrap().contains(&binding.table_name);
        if slow {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_ensure.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("table store unavailable".into()));
        }
        self.inner.ensure_table(binding).await
    }

    async fn insert(&self, binding: &StorageBinding, row: Row) -> Result<Row, StorageError> {
        self.inner.insert(binding, row).await
    }

    async fn select_all(&self, binding: &StorageBinding) -> Result<Vec<Row>, StorageError> {
        self.inner.select_all(binding).await
    }

    async fn select_by_id(&self, binding: &StorageBinding, id: &str) -> Result<Option<Row>, StorageError> {
        self.inner.select_by_id(binding, id).await
    }

    async fn update_by_id(&self, binding: &StorageBinding, id: &str, patch: Row) -> Result<Option<Row>, StorageError> {
        self.inner.update_by_id(binding, id, patch).await
    }

    async fn delete_by_id(&self, binding: &StorageBinding, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_by_id(binding, id).await
    }
}

pub fn product_json() -> Value {
    json!({
        "name": "Product",
        "fields": [
            { "name": "name", "type": "string", "required": true },
            { "name": "price", "type": "number", "required": true },
            { "name": "inStock", "type": "boolean" }
        ],
        "rbac": {
            "Admin": ["all"],
            "Manager": ["read", "create", "update"],
            "Viewer": ["read"]
        }
    })
}

pub fn product() -> ModelDefinition {
    ModelDefinition::from_json(product_json()).expect("product definition")
}

pub fn simple_model(name: &str) -> ModelDefinition {
    ModelDefinition::from_json(json!({
        "name": name,
        "fields": [{ "name": "title", "type": "string" }],
        "rbac": { "Admin": ["all"], "Viewer": ["read"] }
    }))
    .expect("simple definition")
}

pub fn request(method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header("X-User-Id", "user-1").header("X-User-Role", role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn decode_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}
