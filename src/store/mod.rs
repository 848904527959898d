//! Storage collaborators: the Table Store holding model rows and the File Store holding
//! model definitions. Every call made through them is bounded by [`with_timeout`].

mod file;
mod memory;
mod postgres;

pub use file::DirFileStore;
pub use memory::MemoryTableStore;
pub use postgres::{ensure_database_exists, PgTableStore};

use crate::config::StorageBinding;
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One record as a JSON object keyed by column name.
pub type Row = Map<String, Value>;

/// Relational storage for model rows. Rows returned carry `id`, every bound field, and timestamps.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create the table or alter it to carry every bound column.
    async fn ensure_table(&self, binding: &StorageBinding) -> Result<(), StorageError>;

    /// Insert a row; the store assigns `id` and timestamps.
    async fn insert(&self, binding: &StorageBinding, row: Row) -> Result<Row, StorageError>;

    async fn select_all(&self, binding: &StorageBinding) -> Result<Vec<Row>, StorageError>;

    async fn select_by_id(&self, binding: &StorageBinding, id: &str) -> Result<Option<Row>, StorageError>;

    async fn update_by_id(&self, binding: &StorageBinding, id: &str, patch: Row) -> Result<Option<Row>, StorageError>;

    /// Returns false when no row had `id`.
    async fn delete_by_id(&self, binding: &StorageBinding, id: &str) -> Result<bool, StorageError>;
}

/// Persistence for model definitions, one JSON document per model.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn write_definition(&self, name: &str, json: &Value) -> Result<PathBuf, StorageError>;

    async fn list_definition_files(&self) -> Result<Vec<PathBuf>, StorageError>;

    async fn read_definition(&self, path: &Path) -> Result<Value, StorageError>;
}

/// Run a storage call, failing with `StorageError::Timeout` once `after` elapses.
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, ?after, "storage call timed out");
            Err(StorageError::Timeout { operation, after })
        }
    }
}
