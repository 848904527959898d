//! Raw definition types matching the persisted JSON shape, plus the closed role/action/type enumerations.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Abstract field type. Closed: anything else is rejected at validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
        }
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "boolean" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            _ => Err(ValidationError::UnknownFieldType(s.to_string())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller role. Extending it means adding a variant here, not adding data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Viewer => "Viewer",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownRole(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete operation class. `all` is not an action; see [`PermissionSet::all`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker accepted in a role's action list meaning "every action".
pub const ALL_ACTIONS_MARKER: &str = "all";

/// Actions granted to one role. The `all` marker is kept as a flag next to the explicit set,
/// never expanded into it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet {
    pub actions: BTreeSet<Action>,
    pub all: bool,
}

impl PermissionSet {
    pub fn everything() -> Self {
        PermissionSet {
            actions: BTreeSet::new(),
            all: true,
        }
    }

    pub fn of(actions: impl IntoIterator<Item = Action>) -> Self {
        PermissionSet {
            actions: actions.into_iter().collect(),
            all: false,
        }
    }

    /// Parse a persisted action list such as `["read", "create"]` or `["all"]`.
    pub fn parse<S: AsRef<str>>(items: &[S]) -> Result<Self, ValidationError> {
        let mut set = PermissionSet::default();
        for item in items {
            let raw = item.as_ref().trim().to_lowercase();
            if raw == ALL_ACTIONS_MARKER {
                set.all = true;
                continue;
            }
            let action = Action::ALL
                .into_iter()
                .find(|a| a.as_str() == raw)
                .ok_or_else(|| ValidationError::UnknownAction(item.as_ref().to_string()))?;
            set.actions.insert(action);
        }
        Ok(set)
    }

    pub fn to_strings(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.actions.len() + 1);
        if self.all {
            out.push(ALL_ACTIONS_MARKER.to_string());
        }
        out.extend(self.actions.iter().map(|a| a.as_str().to_string()));
        out
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_strings().serialize(serializer)
    }
}

/// Role -> granted actions for one model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PermissionMatrix(pub BTreeMap<Role, PermissionSet>);

impl PermissionMatrix {
    pub fn get(&self, role: Role) -> Option<&PermissionSet> {
        self.0.get(&role)
    }

    pub fn insert(&mut self, role: Role, set: PermissionSet) {
        self.0.insert(role, set);
    }
}

impl FromIterator<(Role, PermissionSet)> for PermissionMatrix {
    fn from_iter<I: IntoIterator<Item = (Role, PermissionSet)>>(iter: I) -> Self {
        PermissionMatrix(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub unique: bool,
}

/// A model definition as published by an operator or read from a definition file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Role name -> action names, e.g. `{"Admin": ["all"], "Viewer": ["read"]}`.
    #[serde(default)]
    pub rbac: BTreeMap<String, Vec<String>>,
}

impl ModelDefinition {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_set_keeps_all_as_flag() {
        let set = PermissionSet::parse(&["all", "read"]).unwrap();
        assert!(set.all);
        assert_eq!(set.actions.len(), 1);
        assert!(set.actions.contains(&Action::Read));
        assert_eq!(set.to_strings(), vec!["all", "read"]);
    }

    #[test]
    fn permission_set_rejects_unknown_action() {
        let err = PermissionSet::parse(&["read", "publish"]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownAction(a) if a == "publish"));
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn definition_from_json_reads_persisted_shape() {
        let def = ModelDefinition::from_json(serde_json::json!({
            "name": "Product",
            "fields": [
                { "name": "name", "type": "string", "required": true },
                { "name": "price", "type": "number", "required": true, "default": 0 }
            ],
            "rbac": { "Admin": ["all"], "Viewer": ["read"] }
        }))
        .unwrap();
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.fields[1].default, Some(serde_json::json!(0)));
        assert!(!def.fields[0].unique);
        assert_eq!(def.rbac["Viewer"], vec!["read"]);
    }

    #[test]
    fn definition_from_json_reports_malformed() {
        let err = ModelDefinition::from_json(serde_json::json!({ "fields": [] })).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }
}
