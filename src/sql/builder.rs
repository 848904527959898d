//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a storage binding.

use crate::config::{StorageBinding, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::migration::{qualified, quote};
use serde_json::{Map, Value};

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Output columns (id, fields, timestamps) in binding order.
fn select_column_list(binding: &StorageBinding) -> String {
    binding
        .output_columns()
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT every row, oldest first.
pub fn select_all(schema: &str, binding: &StorageBinding) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}, {}",
        select_column_list(binding),
        qualified(schema, &binding.table_name),
        quote(CREATED_AT_COLUMN),
        quote(ID_COLUMN)
    );
    q
}

/// SELECT by primary key.
pub fn select_by_id(schema: &str, binding: &StorageBinding, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}::uuid",
        select_column_list(binding),
        qualified(schema, &binding.table_name),
        quote(ID_COLUMN),
        n
    );
    q
}

/// INSERT one value per bound column; columns missing from `row` are bound as NULL.
/// The id and timestamps come from column defaults.
pub fn insert(schema: &str, binding: &StorageBinding, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(binding.columns.len());
    let mut placeholders = Vec::with_capacity(binding.columns.len());
    for c in &binding.columns {
        let n = q.push_param(row.get(&c.name).cloned().unwrap_or(Value::Null));
        cols.push(quote(&c.name));
        placeholders.push(format!("${}::{}", n, c.column_type.pg_type()));
    }
    let table = qualified(schema, &binding.table_name);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, select_column_list(binding))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(binding)
        )
    };
    q
}

/// UPDATE by id: SET only bound columns present in `patch`, and bump `updated_at`.
pub fn update(schema: &str, binding: &StorageBinding, id: &str, patch: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &binding.columns {
        let Some(v) = patch.get(&c.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = ${}::{}", quote(&c.name), n, c.column_type.pg_type()));
    }
    sets.push(format!("{} = NOW()", quote(UPDATED_AT_COLUMN)));
    let id_param = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}::uuid RETURNING {}",
        qualified(schema, &binding.table_name),
        sets.join(", "),
        quote(ID_COLUMN),
        id_param,
        select_column_list(binding)
    );
    q
}

/// DELETE by id, returning the id when a row was removed.
pub fn delete(schema: &str, binding: &StorageBinding, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(id.to_string()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}::uuid RETURNING {}",
        qualified(schema, &binding.table_name),
        quote(ID_COLUMN),
        n,
        quote(ID_COLUMN)
    );
    q
}
