//! Validated definition and its derived storage binding, flattened for runtime use.

use crate::config::{FieldType, ModelDefinition, PermissionMatrix};
use crate::migration::{column_type_for, ColumnType};
use serde::Serialize;

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Names owned by the storage binding; fields may not use them.
pub const RESERVED_FIELD_NAMES: [&str; 3] = [ID_COLUMN, CREATED_AT_COLUMN, UPDATED_AT_COLUMN];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    /// Already coerced to `field_type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    pub unique: bool,
}

/// A definition that passed validation. Serializes to the persisted JSON shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidatedDefinition {
    pub name: String,
    pub fields: Vec<Field>,
    /// Has an entry for every role.
    #[serde(rename = "rbac")]
    pub permissions: PermissionMatrix,
}

impl ValidatedDefinition {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "fields": self.fields,
            "rbac": self.permissions,
        })
    }

    /// Back to the raw shape, e.g. to re-validate or republish.
    pub fn to_definition(&self) -> ModelDefinition {
        ModelDefinition {
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| crate::config::FieldDefinition {
                    name: f.name.clone(),
                    type_: f.field_type.as_str().to_string(),
                    required: f.required,
                    default: f.default.clone(),
                    unique: f.unique,
                })
                .collect(),
            rbac: self
                .permissions
                .0
                .iter()
                .map(|(role, set)| (role.as_str().to_string(), set.to_strings()))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub unique: bool,
}

/// Table name and field columns backing one model. System columns (`id`, timestamps) are implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct StorageBinding {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl StorageBinding {
    pub fn for_definition(definition: &ValidatedDefinition) -> Self {
        StorageBinding {
            table_name: definition.name.clone(),
            columns: definition
                .fields
                .iter()
                .map(|f| ColumnInfo {
                    name: f.name.clone(),
                    column_type: column_type_for(f.field_type),
                    unique: f.unique,
                })
                .collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `id`, then field columns, then timestamps: the shape returned to callers.
    pub fn output_columns(&self) -> Vec<ColumnInfo> {
        let mut out = vec![ColumnInfo {
            name: ID_COLUMN.into(),
            column_type: ColumnType::Uuid,
            unique: true,
        }];
        out.extend(self.columns.iter().cloned());
        for ts in [CREATED_AT_COLUMN, UPDATED_AT_COLUMN] {
            out.push(ColumnInfo {
                name: ts.into(),
                column_type: ColumnType::TimestampTz,
                unique: false,
            });
        }
        out
    }
}
