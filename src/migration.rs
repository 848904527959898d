//! Field type -> column type mapping and additive DDL for model tables.
//! Columns are added or retyped to follow a definition; columns of removed fields are kept.

use crate::config::{FieldType, StorageBinding, CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::error::ValidationError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Storage column type backing a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    DoublePrecision,
    Boolean,
    TimestampTz,
    Uuid,
}

impl ColumnType {
    /// PostgreSQL type name, also used for `$n::type` casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::TimestampTz => "timestamptz",
            ColumnType::Uuid => "uuid",
        }
    }

    /// Field type whose values this column holds. `None` for the system id column.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            ColumnType::Text => Some(FieldType::String),
            ColumnType::DoublePrecision => Some(FieldType::Number),
            ColumnType::Boolean => Some(FieldType::Boolean),
            ColumnType::TimestampTz => Some(FieldType::Date),
            ColumnType::Uuid => None,
        }
    }

    /// Name reported by `information_schema.columns.data_type`.
    pub fn catalog_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::TimestampTz => "timestamp with time zone",
            ColumnType::Uuid => "uuid",
        }
    }
}

/// Column type for a field type.
pub fn column_type_for(field_type: FieldType) -> ColumnType {
    match field_type {
        FieldType::String => ColumnType::Text,
        FieldType::Number => ColumnType::DoublePrecision,
        FieldType::Boolean => ColumnType::Boolean,
        FieldType::Date => ColumnType::TimestampTz,
    }
}

/// Column type for a field type name, e.g. `"number"`. Fails with `UnknownFieldType` outside the closed set.
pub fn map_type(type_name: &str) -> Result<ColumnType, ValidationError> {
    let field_type: FieldType = type_name.parse()?;
    Ok(column_type_for(field_type))
}

/// One step needed to bring an existing table in line with a binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Alteration {
    AddColumn { name: String, column_type: ColumnType },
    Retype { name: String, from: String, to: ColumnType },
    /// Column no longer in the definition. Kept with its data; never selected.
    Retain { name: String },
}

/// Compare existing columns (name -> catalog type name) with the binding.
pub fn plan_alterations(existing: &BTreeMap<String, String>, binding: &StorageBinding) -> Vec<Alteration> {
    let mut out = Vec::new();
    for col in &binding.columns {
        match existing.get(&col.name) {
            None => out.push(Alteration::AddColumn {
                name: col.name.clone(),
                column_type: col.column_type,
            }),
            Some(current) if !current.eq_ignore_ascii_case(col.column_type.catalog_name()) => {
                out.push(Alteration::Retype {
                    name: col.name.clone(),
                    from: current.clone(),
                    to: col.column_type,
                })
            }
            Some(_) => {}
        }
    }
    for name in existing.keys() {
        let is_system = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN].contains(&name.as_str());
        if !is_system && binding.column(name).is_none() {
            out.push(Alteration::Retain { name: name.clone() });
        }
    }
    out
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub(crate) fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote(schema), quote(table))
}

/// CREATE TABLE IF NOT EXISTS with system columns and one nullable column per field.
pub fn create_table_sql(schema: &str, binding: &StorageBinding) -> String {
    let mut col_defs = vec![
        format!("{} UUID PRIMARY KEY DEFAULT gen_random_uuid()", quote(ID_COLUMN)),
        format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote(CREATED_AT_COLUMN)),
        format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote(UPDATED_AT_COLUMN)),
    ];
    for c in &binding.columns {
        col_defs.push(format!("{} {}", quote(&c.name), c.column_type.pg_type()));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified(schema, &binding.table_name),
        col_defs.join(",\n  ")
    )
}

/// DDL for one alteration; `Retain` needs none.
pub fn alteration_sql(schema: &str, table: &str, alteration: &Alteration) -> Option<String> {
    let full = qualified(schema, table);
    match alteration {
        Alteration::AddColumn { name, column_type } => Some(format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            full,
            quote(name),
            column_type.pg_type()
        )),
        Alteration::Retype { name, to, .. } => Some(format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{}",
            full,
            quote(name),
            to.pg_type(),
            quote(name),
            to.pg_type()
        )),
        Alteration::Retain { .. } => None,
    }
}

/// PostgreSQL truncates longer identifiers.
const MAX_IDENTIFIER_BYTES: usize = 63;

/// `<table>_<column>_key`, or when that is too long, a truncated prefix plus a hash of
/// `table.column` so distinct columns never collapse onto one name.
pub fn unique_index_name(table: &str, column: &str) -> String {
    let plain = format!("{}_{}_key", table, column);
    if plain.len() <= MAX_IDENTIFIER_BYTES {
        return plain;
    }
    let mut hasher = Sha256::new();
    hasher.update(format!("{}.{}", table, column).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    let suffix = format!("_{}_key", &digest[..12]);
    let mut cut = MAX_IDENTIFIER_BYTES - suffix.len();
    while !plain.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &plain[..cut], suffix)
}

/// Advisory unique index for a column flagged `unique`.
pub fn unique_index_sql(schema: &str, table: &str, column: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
        quote(&unique_index_name(table, column)),
        qualified(schema, table),
        quote(column)
    )
}
