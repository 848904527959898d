//! Definition validation: names, fields, closed types, defaults, and a complete permission matrix.
//!
//! Roles missing from `rbac` are filled with an empty permission set (deny everything) rather
//! than rejected. Unknown role or action names are rejected.

use crate::config::{
    Field, FieldType, ModelDefinition, PermissionMatrix, PermissionSet, Role, ValidatedDefinition,
    RESERVED_FIELD_NAMES,
};
use crate::error::ValidationError;
use crate::service::coerce_value;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// PostgreSQL identifier limit.
const MAX_NAME_LEN: usize = 63;

fn identifier_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static pattern"))
}

fn is_identifier(s: &str) -> bool {
    s.len() <= MAX_NAME_LEN && identifier_pattern().is_match(s)
}

pub fn validate(definition: &ModelDefinition) -> Result<ValidatedDefinition, ValidationError> {
    let name = definition.name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !is_identifier(name) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    if definition.fields.is_empty() {
        return Err(ValidationError::NoFields(name.to_string()));
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(definition.fields.len());
    for f in &definition.fields {
        let field_name = f.name.trim();
        if field_name.is_empty() {
            return Err(ValidationError::EmptyFieldName);
        }
        if !is_identifier(field_name) {
            return Err(ValidationError::InvalidFieldName(field_name.to_string()));
        }
        if RESERVED_FIELD_NAMES.contains(&field_name) {
            return Err(ValidationError::ReservedFieldName(field_name.to_string()));
        }
        if !seen.insert(field_name) {
            return Err(ValidationError::DuplicateField(field_name.to_string()));
        }
        let field_type: FieldType = f.type_.parse()?;
        let default = match &f.default {
            Some(v) => {
                let coerced = coerce_value(field_name, field_type, v).map_err(|_| ValidationError::InvalidDefault {
                    field: field_name.to_string(),
                    expected: field_type.as_str(),
                })?;
                Some(coerced).filter(|v| !v.is_null())
            }
            None => None,
        };
        fields.push(Field {
            name: field_name.to_string(),
            field_type,
            required: f.required,
            default,
            unique: f.unique,
        });
    }

    let mut permissions = PermissionMatrix::default();
    for (role_name, actions) in &definition.rbac {
        let role: Role = role_name.parse()?;
        if permissions.get(role).is_some() {
            return Err(ValidationError::DuplicateRole(role_name.clone()));
        }
        permissions.insert(role, PermissionSet::parse(actions)?);
    }
    for role in Role::ALL {
        if permissions.get(role).is_none() {
            permissions.insert(role, PermissionSet::default());
        }
    }

    Ok(ValidatedDefinition {
        name: name.to_string(),
        fields,
        permissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Action;
    use serde_json::json;

    fn definition(value: serde_json::Value) -> ModelDefinition {
        ModelDefinition::from_json(value).unwrap()
    }

    fn product() -> ModelDefinition {
        definition(json!({
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
        }))
    }

    #[test]
    fn accepts_product_and_keeps_field_order() {
        let v = validate(&product()).unwrap();
        let names: Vec<_> = v.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "price", "inStock"]);
        assert!(v.permissions.get(Role::Admin).unwrap().all);
        assert_eq!(
            v.permissions.get(Role::Manager).unwrap(),
            &PermissionSet::of([Action::Read, Action::Create, Action::Update])
        );
    }

    #[test]
    fn fills_missing_roles_with_empty_set() {
        let mut def = product();
        def.rbac.remove("Viewer");
        let v = validate(&def).unwrap();
        assert_eq!(v.permissions.get(Role::Viewer), Some(&PermissionSet::default()));
    }

    #[test]
    fn rejects_structural_problems() {
        let mut def = product();
        def.name = "  ".into();
        assert!(matches!(validate(&def), Err(ValidationError::EmptyName)));

        let mut def = product();
        def.name = "drop table".into();
        assert!(matches!(validate(&def), Err(ValidationError::InvalidName(_))));

        let mut def = product();
        def.fields.clear();
        assert!(matches!(validate(&def), Err(ValidationError::NoFields(_))));

        let mut def = product();
        def.fields[2].name = "price".into();
        assert!(matches!(validate(&def), Err(ValidationError::DuplicateField(f)) if f == "price"));

        let mut def = product();
        def.fields[0].name = "id".into();
        assert!(matches!(validate(&def), Err(ValidationError::ReservedFieldName(_))));

        let mut def = product();
        def.fields[0].type_ = "json".into();
        assert!(matches!(validate(&def), Err(ValidationError::UnknownFieldType(t)) if t == "json"));
    }

    #[test]
    fn rejects_unknown_roles_and_actions() {
        let mut def = product();
        def.rbac.insert("Owner".into(), vec!["read".into()]);
        assert!(matches!(validate(&def), Err(ValidationError::UnknownRole(_))));

        let mut def = product();
        def.rbac.insert("Viewer".into(), vec!["export".into()]);
        assert!(matches!(validate(&def), Err(ValidationError::UnknownAction(_))));
    }

    #[test]
    fn rejects_role_named_twice_in_different_case() {
        let mut def = product();
        def.rbac.insert("admin".into(), Vec::new());
        let err = validate(&def).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateRole(r) if r == "admin"));
    }

    #[test]
    fn coerces_defaults_and_rejects_bad_ones() {
        let mut def = product();
        def.fields[2].default = Some(json!("yes"));
        let v = validate(&def).unwrap();
        assert_eq!(v.fields[2].default, Some(json!(true)));

        def.fields[1].default = Some(json!("free"));
        assert!(matches!(validate(&def), Err(ValidationError::InvalidDefault { .. })));
    }

    #[test]
    fn validated_round_trips_through_raw_shape() {
        let v = validate(&product()).unwrap();
        let again = validate(&v.to_definition()).unwrap();
        assert_eq!(v, again);
        let json = v.to_json();
        assert_eq!(json["rbac"]["Admin"], json!(["all"]));
        assert_eq!(json["fields"][1]["type"], json!("number"));
    }
}
