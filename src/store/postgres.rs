//! PostgreSQL Table Store. Tables live in one schema; DDL is additive only.

use super::{Row, TableStore};
use crate::config::{ColumnInfo, StorageBinding};
use crate::error::StorageError;
use crate::migration::{alteration_sql, create_table_sql, plan_alterations, quote, unique_index_sql, Alteration, ColumnType};
use crate::service::canonical_date;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{ConnectOptions, PgPool, Row as _};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
    schema: String,
}

impl PgTableStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgTableStore {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, binding: &StorageBinding, q: &QueryBuf) -> Result<Option<Row>, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_json(binding, &r)).transpose()
    }

    async fn fetch_all(&self, binding: &StorageBinding, q: &QueryBuf) -> Result<Vec<Row>, StorageError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_json(binding, r)).collect()
    }
}

/// Ids are UUIDs; anything else cannot match a row.
fn is_uuid(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn ensure_table(&self, binding: &StorageBinding) -> Result<(), StorageError> {
        let table = &binding.table_name;
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(&self.schema)))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_table_sql(&self.schema, binding))
            .execute(&mut *tx)
            .await?;

        let existing: BTreeMap<String, String> = sqlx::query_as::<_, (String, String)>(
            "SELECT column_name::text, data_type::text FROM information_schema.columns \
             WHERE table_schema = $1 AND table_name = $2",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        for alteration in plan_alterations(&existing, binding) {
            match alteration_sql(&self.schema, table, &alteration) {
                Some(ddl) => {
                    tracing::info!(table = %table, ?alteration, "altering table");
                    sqlx::query(&ddl).execute(&mut *tx).await?;
                }
                None => {
                    if let Alteration::Retain { name } = &alteration {
                        tracing::info!(table = %table, column = %name, "retaining column of removed field");
                    }
                }
            }
        }
        tx.commit().await?;

        for col in binding.columns.iter().filter(|c| c.unique) {
            let ddl = unique_index_sql(&self.schema, table, &col.name);
            if let Err(e) = sqlx::query(&ddl).execute(&self.pool).await {
                tracing::warn!(table = %table, column = %col.name, error = %e, "unique index not created");
            }
        }
        Ok(())
    }

    async fn insert(&self, binding: &StorageBinding, row: Row) -> Result<Row, StorageError> {
        let q = sql::insert(&self.schema, binding, &row);
        self.fetch_optional(binding, &q)
            .await?
            .ok_or_else(|| StorageError::Database(sqlx::Error::RowNotFound))
    }

    async fn select_all(&self, binding: &StorageBinding) -> Result<Vec<Row>, StorageError> {
        let q = sql::select_all(&self.schema, binding);
        self.fetch_all(binding, &q).await
    }

    async fn select_by_id(&self, binding: &StorageBinding, id: &str) -> Result<Option<Row>, StorageError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let q = sql::select_by_id(&self.schema, binding, id);
        self.fetch_optional(binding, &q).await
    }

    async fn update_by_id(&self, binding: &StorageBinding, id: &str, patch: Row) -> Result<Option<Row>, StorageError> {
        if !is_uuid(id) {
            return Ok(None);
        }
        let q = sql::update(&self.schema, binding, id, &patch);
        self.fetch_optional(binding, &q).await
    }

    async fn delete_by_id(&self, binding: &StorageBinding, id: &str) -> Result<bool, StorageError> {
        if !is_uuid(id) {
            return Ok(false);
        }
        let q = sql::delete(&self.schema, binding, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.fetch_optional(&self.pool).await?.is_some())
    }
}

fn row_to_json(binding: &StorageBinding, row: &PgRow) -> Result<Row, StorageError> {
    let mut map = Row::new();
    for col in binding.output_columns() {
        let v = cell_to_value(row, &col)?;
        map.insert(col.name, v);
    }
    Ok(map)
}

fn cell_to_value(row: &PgRow, col: &ColumnInfo) -> Result<Value, StorageError> {
    let name = col.name.as_str();
    Ok(match col.column_type {
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        ColumnType::Text => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        ColumnType::DoublePrecision => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnType::Boolean => row
            .try_get::<Option<bool>, _>(name)?
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        ColumnType::TimestampTz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(canonical_date(&d)))
            .unwrap_or(Value::Null),
    })
}

/// Create the database named in `database_url` if it does not exist (connects to `postgres` on the same server).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StorageError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StorageError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StorageError::Rejected("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}
