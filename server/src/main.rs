//! Blueprint server: loads persisted model definitions and serves their CRUD routes.
//!
//! Run from repo root: `cargo run -p blueprint-server`

use blueprint_sdk::{
    app_router, ensure_database_exists, load_persisted, AppState, DirFileStore, MemoryTableStore, PgTableStore,
    PublishOrchestrator, SchemaRegistry, Settings, StorageBackend, TableStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("blueprint_sdk=info,blueprint_server=info")),
        )
        .init();

    let (store, pool): (Arc<dyn TableStore>, Option<sqlx::PgPool>) = match settings.backend {
        StorageBackend::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(&settings.database_url)
                .await?;
            let store: Arc<dyn TableStore> = Arc::new(PgTableStore::new(pool.clone(), settings.schema.clone()));
            (store, Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory table store; rows are lost on exit");
            let store: Arc<dyn TableStore> = Arc::new(MemoryTableStore::new());
            (store, None)
        }
    };

    let registry = Arc::new(SchemaRegistry::new(store, settings.storage_timeout));
    let files = Arc::new(DirFileStore::new(settings.models_dir.clone()));
    let publisher = Arc::new(PublishOrchestrator::new(registry, files));

    let report = load_persisted(&publisher).await?;
    for skipped in &report.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "definition not loaded");
    }
    tracing::info!(models = ?report.loaded, dir = %settings.models_dir.display(), "boot complete");

    let app = app_router(AppState::new(publisher, pool));
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!("blueprint server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
