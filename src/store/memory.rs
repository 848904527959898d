//! In-process Table Store. Rows live for the lifetime of the process.

use super::{Row, TableStore};
use crate::config::{StorageBinding, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::error::StorageError;
use crate::migration::ColumnType;
use crate::service::{canonical_date, coerce_value};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct MemTable {
    /// Every column ever bound; removed fields stay.
    columns: BTreeMap<String, ColumnType>,
    rows: Vec<Row>,
}

#[derive(Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns currently held for a table, including retained ones.
    pub async fn columns(&self, table: &str) -> Option<BTreeMap<String, ColumnType>> {
        self.tables.read().await.get(table).map(|t| t.columns.clone())
    }
}

fn missing_table(binding: &StorageBinding) -> StorageError {
    StorageError::Rejected(format!("table {} does not exist", binding.table_name))
}

fn project(binding: &StorageBinding, row: &Row) -> Row {
    binding
        .output_columns()
        .into_iter()
        .map(|c| {
            let v = row.get(&c.name).cloned().unwrap_or(Value::Null);
            (c.name, v)
        })
        .collect()
}

/// Reject a value that collides with another row on a `unique` column.
fn check_unique(binding: &StorageBinding, rows: &[Row], candidate: &Row, own_id: Option<&str>) -> Result<(), StorageError> {
    for col in binding.columns.iter().filter(|c| c.unique) {
        let Some(v) = candidate.get(&col.name).filter(|v| !v.is_null()) else { continue };
        let clash = rows.iter().any(|r| {
            let same_row = own_id.is_some() && r.get(ID_COLUMN).and_then(Value::as_str) == own_id;
            !same_row && r.get(&col.name) == Some(v)
        });
        if clash {
            return Err(StorageError::Rejected(format!(
                "duplicate value for unique column {}.{}",
                binding.table_name, col.name
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn ensure_table(&self, binding: &StorageBinding) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(binding.table_name.clone()).or_default();

        // Convert every affected row before touching the table, so a failed cast changes nothing.
        let mut converted: Vec<(usize, String, Value)> = Vec::new();
        for col in &binding.columns {
            match table.columns.get(&col.name) {
                Some(current) if *current != col.column_type => {}
                _ => continue,
            }
            let Some(field_type) = col.column_type.field_type() else {
                return Err(StorageError::Rejected(format!("cannot retype {}.{}", binding.table_name, col.name)));
            };
            for (i, row) in table.rows.iter().enumerate() {
                let Some(v) = row.get(&col.name).filter(|v| !v.is_null()) else { continue };
                let cast = coerce_value(&col.name, field_type, v).map_err(|e| {
                    StorageError::Rejected(format!(
                        "cannot retype {}.{} to {}: {}",
                        binding.table_name,
                        col.name,
                        col.column_type.pg_type(),
                        e
                    ))
                })?;
                converted.push((i, col.name.clone(), cast));
            }
        }

        for (i, name, v) in converted {
            table.rows[i].insert(name, v);
        }
        for col in &binding.columns {
            table.columns.insert(col.name.clone(), col.column_type);
        }
        Ok(())
    }

    async fn insert(&self, binding: &StorageBinding, row: Row) -> Result<Row, StorageError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&binding.table_name).ok_or_else(|| missing_table(binding))?;
        check_unique(binding, &table.rows, &row, None)?;
        let now = Value::String(canonical_date(&chrono::Utc::now()));
        let mut stored = row;
        stored.insert(ID_COLUMN.into(), Value::String(uuid::Uuid::new_v4().to_string()));
        stored.insert(CREATED_AT_COLUMN.into(), now.clone());
        stored.insert(UPDATED_AT_COLUMN.into(), now);
        let out = project(binding, &stored);
        table.rows.push(stored);
        Ok(out)
    }

    async fn select_all(&self, binding: &StorageBinding) -> Result<Vec<Row>, StorageError> {
        let tables = self.tables.read().await;
        let table = tables.get(&binding.table_name).ok_or_else(|| missing_table(binding))?;
        Ok(table.rows.iter().map(|r| project(binding, r)).collect())
    }

    async fn select_by_id(&self, binding: &StorageBinding, id: &str) -> Result<Option<Row>, StorageError> {
        let tables = self.tables.read().await;
        let table = tables.get(&binding.table_name).ok_or_else(|| missing_table(binding))?;
        Ok(table
            .rows
            .iter()
            .find(|r| r.get(ID_COLUMN).and_then(Value::as_str) == Some(id))
            .map(|r| project(binding, r)))
    }

    async fn update_by_id(&self, binding: &StorageBinding, id: &str, patch: Row) -> Result<Option<Row>, StorageError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&binding.table_name).ok_or_else(|| missing_table(binding))?;
        let Some(pos) = table.rows.iter().position(|r| r.get(ID_COLUMN).and_then(Value::as_str) == Some(id)) else {
            return Ok(None);
        };
        check_unique(binding, &table.rows, &patch, Some(id))?;
        let row = &mut table.rows[pos];
        for (k, v) in patch {
            if binding.column(&k).is_some() {
                row.insert(k, v);
            }
        }
        row.insert(UPDATED_AT_COLUMN.into(), Value::String(canonical_date(&chrono::Utc::now())));
        Ok(Some(project(binding, row)))
    }

    async fn delete_by_id(&self, binding: &StorageBinding, id: &str) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let table = tables.get_mut(&binding.table_name).ok_or_else(|| missing_table(binding))?;
        let before = table.rows.len();
        table.rows.retain(|r| r.get(ID_COLUMN).and_then(Value::as_str) != Some(id));
        Ok(table.rows.len() != before)
    }
}
