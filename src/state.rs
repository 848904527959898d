//! Shared application state for all routes. The registry is swapped per model on publish,
//! so new and redefined models are served without restart.

use crate::publish::PublishOrchestrator;
use crate::registry::SchemaRegistry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SchemaRegistry>,
    pub publisher: Arc<PublishOrchestrator>,
    /// Present with the Postgres backend; used by the readiness check.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(publisher: Arc<PublishOrchestrator>, pool: Option<PgPool>) -> Self {
        AppState {
            registry: Arc::clone(publisher.registry()),
            publisher,
            pool,
        }
    }
}
